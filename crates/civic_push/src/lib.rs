//! Push delivery for the civic alerts pipeline
//!
//! * [`client`] - HTTP client for the Expo push API
//! * [`dispatcher`] - chunked fan-out of one notification to many tokens
//! * [`reconciler`] - turns pending receipts into final delivery status
//! * [`tokens`] - token registration, reactivation and deactivation

pub mod client;
pub mod dispatcher;
pub mod reconciler;
pub mod tokens;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{is_expo_push_token, ExpoPushClient, PushError};
pub use dispatcher::{DispatchReport, DispatchSummary, PushDispatcher, TokenOutcome};
pub use reconciler::{ReceiptReconciler, ReconcileReport};
pub use tokens::TokenLifecycleManager;

#[cfg(test)]
pub(crate) mod testing {
    use civic_config::DatabaseConfig;
    use civic_db::{DbClient, Store};

    /// A migrated store over a fresh SQLite file in the temp dir
    pub async fn temp_store() -> Store {
        let path = std::env::temp_dir().join(format!("civic_push_{}.db", uuid::Uuid::new_v4()));
        let client = DbClient::from_config(&DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: Some(1),
        })
        .await
        .unwrap();
        let store = Store::new(client);
        store.init_schema().await.unwrap();
        store
    }
}
