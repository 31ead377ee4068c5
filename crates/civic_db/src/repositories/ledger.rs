//! Dedup ledger of alerts already sent
//!
//! The ledger is keyed by identity, alert type and source id. A row means
//! "this identity has been notified about this occurrence"; users and
//! anonymous devices live in separate tables.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use civic_common::{AlertType, Identity};

/// A ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub identity: Identity,
    pub alert_type: AlertType,
    pub source_id: String,
    /// JSON copy of the event that fired
    pub snapshot: String,
    pub triggered_at: DateTime<Utc>,
}

/// Rows removed by a retention purge, per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerPurge {
    pub triggered_alerts: u64,
    pub device_triggered_alerts: u64,
}

pub trait DedupLedger {
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Whether a row exists for the key
    fn has_triggered(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Insert the row unless it exists.
    ///
    /// Returns `true` only for the call that inserted it; a duplicate is a
    /// silent `false`, never an error. Concurrent callers for one key see
    /// exactly one `true`.
    fn record_triggered(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
        snapshot: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// [`DedupLedger::record_triggered`] with an explicit timestamp
    fn record_triggered_at(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
        snapshot: &str,
        triggered_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Delete a claim whose dispatch reached no device, so a later cycle may retry.
    fn release(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    fn find(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<TriggeredAlert>, DbError>> + Send;

    /// Delete every row triggered strictly before `cutoff`
    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<LedgerPurge, DbError>> + Send;
}
