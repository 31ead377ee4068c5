//! The assembled pipeline: one matching cycle per configured feed, the
//! receipt reconciler and the retention sweeper, over one store.

use crate::cycle::{CycleReport, MatchingCycle};
use crate::source::sources_from_config;
use crate::sweeper::{RetentionSweeper, SweepReport};
use civic_common::{not_found, AlertType, CivicError, EventSource, PushProvider};
use civic_config::AppConfig;
use civic_db::Store;
use civic_push::{
    ExpoPushClient, PushDispatcher, ReceiptReconciler, ReconcileReport, TokenLifecycleManager,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Timeout for one feed adapter request.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AlertPipeline {
    store: Store,
    tokens: TokenLifecycleManager,
    cycle: MatchingCycle,
    reconciler: ReceiptReconciler,
    sweeper: RetentionSweeper,
    sources: HashMap<AlertType, Arc<dyn EventSource>>,
}

impl AlertPipeline {
    /// Wire the pipeline around `provider`, without any event source yet
    pub fn new(store: Store, provider: Arc<dyn PushProvider>, config: &AppConfig) -> Self {
        let tokens = TokenLifecycleManager::new(store.subscriptions.clone());
        let dispatcher =
            PushDispatcher::new(provider.clone(), tokens.clone(), store.receipts.clone());
        let cycle = MatchingCycle::new(
            store.subscriptions.clone(),
            store.ledger.clone(),
            dispatcher,
        )
        .with_concurrency(config.matching.concurrency);
        let reconciler = ReceiptReconciler::new(
            provider,
            store.receipts.clone(),
            tokens.clone(),
            &config.push,
        );
        let sweeper = RetentionSweeper::new(
            store.ledger.clone(),
            store.receipts.clone(),
            &config.retention,
        );

        Self {
            store,
            tokens,
            cycle,
            reconciler,
            sweeper,
            sources: HashMap::new(),
        }
    }

    /// The production pipeline: the Expo client and one HTTP source per configured feed
    pub fn from_config(store: Store, config: &AppConfig) -> Result<Self, CivicError> {
        let provider = Arc::new(ExpoPushClient::new(config.push.clone())?);
        let mut pipeline = Self::new(store, provider, config);
        for source in sources_from_config(&config.feeds, FEED_TIMEOUT)? {
            pipeline = pipeline.with_source(source);
        }
        info!(alert_types = ?pipeline.alert_types(), "Alert pipeline ready");
        Ok(pipeline)
    }

    /// Register the feed of an alert type, replacing any previous one
    pub fn with_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.sources.insert(source.alert_type(), source);
        self
    }

    /// Alert types with a feed, in scheduling order
    pub fn alert_types(&self) -> Vec<AlertType> {
        AlertType::ALL
            .into_iter()
            .filter(|t| self.sources.contains_key(t))
            .collect()
    }

    pub async fn run_alert_type(&self, alert_type: AlertType) -> Result<CycleReport, CivicError> {
        let source = self
            .sources
            .get(&alert_type)
            .ok_or_else(|| not_found(format!("no feed configured for {}", alert_type)))?;
        self.cycle.run(source.as_ref()).await
    }

    pub async fn reconcile_receipts(&self) -> Result<ReconcileReport, CivicError> {
        self.reconciler.run().await
    }

    pub async fn sweep(&self) -> Result<SweepReport, CivicError> {
        self.sweeper.sweep().await
    }

    pub fn cycle(&self) -> &MatchingCycle {
        &self.cycle
    }

    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
