//! Push receipt tracking
//!
//! Every message the provider accepts leaves a `pending` receipt behind. The
//! reconciler later moves it to `ok` or `error`; both are terminal.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use civic_common::Identity;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiptState {
    Pending,
    Ok,
    Error,
}

impl ReceiptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptState::Pending => "pending",
            ReceiptState::Ok => "ok",
            ReceiptState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReceiptState::Pending)
    }
}

impl fmt::Display for ReceiptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptState {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReceiptState::Pending),
            "ok" => Ok(ReceiptState::Ok),
            "error" => Ok(ReceiptState::Error),
            other => Err(DbError::DecodeError(format!("unknown receipt status '{}'", other))),
        }
    }
}

/// A stored push receipt
#[derive(Debug, Clone, PartialEq)]
pub struct PushReceiptRecord {
    pub receipt_id: String,
    /// Who the message was sent to
    pub identity: Identity,
    pub push_token: String,
    pub status: ReceiptState,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub checked_at: Option<DateTime<Utc>>,
}

pub trait ReceiptRepository {
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Record an accepted message. A receipt id seen before is left untouched.
    fn insert_pending(
        &self,
        receipt_id: &str,
        identity: &Identity,
        push_token: &str,
        sent_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Oldest pending receipts sent before `cutoff`, at most `limit`
    fn pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<PushReceiptRecord>, DbError>> + Send;

    /// `pending -> ok`. Returns `false` if the receipt was not pending.
    fn mark_ok(
        &self,
        receipt_id: &str,
        checked_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// `pending -> error`. Returns `false` if the receipt was not pending.
    fn mark_error(
        &self,
        receipt_id: &str,
        error_type: &str,
        error_message: Option<&str>,
        checked_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    fn find(
        &self,
        receipt_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<PushReceiptRecord>, DbError>> + Send;

    /// Delete terminal receipts sent before `cutoff`; pending rows are kept regardless of age.
    fn purge_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;
}
