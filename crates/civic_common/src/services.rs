//! Service abstractions for the external collaborators of the pipeline.
//!
//! The push provider and the upstream event feeds sit behind these traits so
//! the dispatcher and the matching cycle can be exercised against in-memory
//! implementations.

use crate::error::CivicError;
use crate::events::CandidateEvent;
use crate::models::AlertType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Error codes a push provider reports for a single message or receipt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushErrorCode {
    /// The token is no longer registered with the provider
    DeviceNotRegistered,
    /// The token is not a well-formed provider token
    InvalidToken,
    MessageTooBig,
    MessageRateExceeded,
    MismatchSenderId,
    InvalidCredentials,
    /// Network failure, timeout or provider outage; outcome unknown
    Transient,
    Other(String),
}

impl PushErrorCode {
    /// Parse the provider's error identifier.
    pub fn from_provider(code: &str) -> Self {
        match code {
            "DeviceNotRegistered" => PushErrorCode::DeviceNotRegistered,
            "InvalidToken" | "InvalidPushToken" => PushErrorCode::InvalidToken,
            "MessageTooBig" => PushErrorCode::MessageTooBig,
            "MessageRateExceeded" => PushErrorCode::MessageRateExceeded,
            "MismatchSenderId" => PushErrorCode::MismatchSenderId,
            "InvalidCredentials" => PushErrorCode::InvalidCredentials,
            other => PushErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PushErrorCode::DeviceNotRegistered => "DeviceNotRegistered",
            PushErrorCode::InvalidToken => "InvalidToken",
            PushErrorCode::MessageTooBig => "MessageTooBig",
            PushErrorCode::MessageRateExceeded => "MessageRateExceeded",
            PushErrorCode::MismatchSenderId => "MismatchSenderId",
            PushErrorCode::InvalidCredentials => "InvalidCredentials",
            PushErrorCode::Transient => "Transient",
            PushErrorCode::Other(code) => code,
        }
    }

    /// The token itself is dead; it must be deactivated and never retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PushErrorCode::DeviceNotRegistered | PushErrorCode::InvalidToken
        )
    }
}

/// A message as handed to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    pub sound: &'static str,
    pub priority: &'static str,
}

/// The provider's synchronous answer for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum PushTicket {
    /// Accepted for delivery; the receipt id can be exchanged for a status later
    Accepted { receipt_id: String },
    Rejected {
        code: PushErrorCode,
        message: Option<String>,
    },
}

/// Final delivery status of an accepted message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptStatus {
    Ok,
    Error {
        code: PushErrorCode,
        message: Option<String>,
    },
}

/// An asynchronous push provider.
pub trait PushProvider: Send + Sync {
    /// Maximum number of messages accepted by one `send` call.
    fn max_batch_size(&self) -> usize;

    /// Maximum number of receipt ids accepted by one `check_receipts` call.
    fn max_receipt_batch_size(&self) -> usize;

    /// Whether the token has the provider's token format.
    fn is_valid_token(&self, token: &str) -> bool;

    /// Send a batch; returns one ticket per message, in order.
    ///
    /// An `Err` means the outcome of the whole batch is unknown.
    fn send<'a>(&'a self, messages: &'a [PushMessage]) -> BoxFuture<'a, Vec<PushTicket>, CivicError>;

    /// Look up receipts. Ids the provider does not report yet are absent from the map.
    fn check_receipts<'a>(
        &'a self,
        receipt_ids: &'a [String],
    ) -> BoxFuture<'a, HashMap<String, ReceiptStatus>, CivicError>;
}

/// An upstream feed producing candidate events of one alert type.
pub trait EventSource: Send + Sync {
    fn alert_type(&self) -> AlertType;

    fn fetch(&self) -> BoxFuture<'_, Vec<CandidateEvent>, CivicError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_codes() {
        assert!(PushErrorCode::from_provider("DeviceNotRegistered").is_permanent());
        assert!(PushErrorCode::InvalidToken.is_permanent());
        assert!(!PushErrorCode::from_provider("MessageRateExceeded").is_permanent());
        assert!(!PushErrorCode::Transient.is_permanent());
        assert_eq!(
            PushErrorCode::from_provider("SomethingNew"),
            PushErrorCode::Other("SomethingNew".to_string())
        );
    }
}
