//! Repository modules for database access
//!
//! This module contains repository traits and implementations for the
//! subscription, ledger and receipt tables.

pub mod ledger;
pub mod ledger_sql;
pub mod receipts;
pub mod receipts_sql;
pub mod subscriptions;
pub mod subscriptions_sql;

pub use ledger::{DedupLedger, LedgerPurge, TriggeredAlert};
pub use ledger_sql::SqlDedupLedger;
pub use receipts::{PushReceiptRecord, ReceiptRepository, ReceiptState};
pub use receipts_sql::SqlReceiptRepository;
pub use subscriptions::{
    AlertSubscription, DeviceSubscription, PushSubscription, SubscriptionRepository,
};
pub use subscriptions_sql::SqlSubscriptionRepository;
