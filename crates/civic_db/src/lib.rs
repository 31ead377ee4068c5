//! Database integration for the civic alerts pipeline
//!
//! This crate provides a database client built on the SQLx `Any` driver and
//! the repositories the pipeline persists through: subscriptions, the dedup
//! ledger and push receipts. SQLite is the default backend; PostgreSQL is
//! available through the `postgres` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use civic_config::AppConfig;
//! use civic_db::Store;
//!
//! async fn setup_db(config: &AppConfig) -> Result<Store, civic_db::DbError> {
//!     let store = Store::connect(config).await?;
//!     store.init_schema().await?;
//!     Ok(store)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod store;
pub mod time;

pub use client::DbClient;
pub use error::DbError;
pub use repositories::{
    AlertSubscription, DedupLedger, DeviceSubscription, LedgerPurge, PushReceiptRecord,
    PushSubscription, ReceiptRepository, ReceiptState, SqlDedupLedger, SqlReceiptRepository,
    SqlSubscriptionRepository, SubscriptionRepository, TriggeredAlert,
};
pub use store::Store;
