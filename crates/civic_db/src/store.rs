//! All repositories over one connection pool

use crate::client::DbClient;
use crate::error::DbError;
use crate::repositories::{
    DedupLedger, ReceiptRepository, SqlDedupLedger, SqlReceiptRepository,
    SqlSubscriptionRepository, SubscriptionRepository,
};
use civic_config::AppConfig;
use tracing::info;

/// The SQL repositories of the pipeline, sharing one [`DbClient`]
#[derive(Debug, Clone)]
pub struct Store {
    client: DbClient,
    pub subscriptions: SqlSubscriptionRepository,
    pub ledger: SqlDedupLedger,
    pub receipts: SqlReceiptRepository,
}

impl Store {
    pub fn new(client: DbClient) -> Self {
        Self {
            subscriptions: SqlSubscriptionRepository::new(client.clone()),
            ledger: SqlDedupLedger::new(client.clone()),
            receipts: SqlReceiptRepository::new(client.clone()),
            client,
        }
    }

    /// Connect using the `database` section of the configuration
    pub async fn connect(config: &AppConfig) -> Result<Self, DbError> {
        Ok(Self::new(DbClient::new(config).await?))
    }

    /// Create every table and index. Safe to run on each startup.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        self.subscriptions.init_schema().await?;
        self.ledger.init_schema().await?;
        self.receipts.init_schema().await?;
        info!("Database schema ready");
        Ok(())
    }

    pub fn client(&self) -> &DbClient {
        &self.client
    }
}
