//! Delivery receipt reconciliation
//!
//! Pending receipts past the grace period are exchanged for their final
//! status. `ok` and `error` are terminal; an `error` receipt whose code says
//! the token is dead deactivates the token it was sent to. Anything the provider cannot answer yet stays
//! pending for the next pass.

use crate::tokens::TokenLifecycleManager;
use chrono::{DateTime, Duration, Utc};
use civic_common::{CivicError, PushProvider, ReceiptStatus};
use civic_config::PushConfig;
use civic_db::{PushReceiptRecord, ReceiptRepository, SqlReceiptRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upper bound on pending rows examined per pass.
pub const DEFAULT_SCAN_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending receipts past the grace period that were looked at
    pub checked: usize,
    pub ok: usize,
    pub errored: usize,
    pub still_pending: usize,
    /// Token rows deactivated because of error receipts
    pub deactivated: u64,
}

#[derive(Clone)]
pub struct ReceiptReconciler {
    provider: Arc<dyn PushProvider>,
    receipts: SqlReceiptRepository,
    tokens: TokenLifecycleManager,
    grace: Duration,
    scan_limit: i64,
}

impl ReceiptReconciler {
    pub fn new(
        provider: Arc<dyn PushProvider>,
        receipts: SqlReceiptRepository,
        tokens: TokenLifecycleManager,
        config: &PushConfig,
    ) -> Self {
        Self {
            provider,
            receipts,
            tokens,
            grace: Duration::minutes(config.receipt_grace_minutes.max(0)),
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    pub fn with_scan_limit(mut self, scan_limit: i64) -> Self {
        self.scan_limit = scan_limit.max(1);
        self
    }

    pub async fn run(&self) -> Result<ReconcileReport, CivicError> {
        self.run_at(Utc::now()).await
    }

    /// One reconciliation pass as of `now`.
    ///
    /// Only loading the pending set can fail the pass; provider and per-row
    /// failures leave the affected receipts pending.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ReconcileReport, CivicError> {
        let pending = self
            .receipts
            .pending_older_than(now - self.grace, self.scan_limit)
            .await?;

        let mut report = ReconcileReport {
            checked: pending.len(),
            ..ReconcileReport::default()
        };
        if pending.is_empty() {
            debug!("No pending receipts to reconcile");
            return Ok(report);
        }

        for chunk in pending.chunks(self.provider.max_receipt_batch_size().max(1)) {
            let ids: Vec<String> = chunk.iter().map(|r| r.receipt_id.clone()).collect();

            let statuses = match self.provider.check_receipts(&ids).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    warn!(size = chunk.len(), "Receipt lookup failed, will retry: {}", e);
                    report.still_pending += chunk.len();
                    continue;
                }
            };

            for receipt in chunk {
                match statuses.get(&receipt.receipt_id) {
                    None => report.still_pending += 1,
                    Some(status) => self.apply(receipt, status, now, &mut report).await,
                }
            }
        }

        info!(
            checked = report.checked,
            ok = report.ok,
            errored = report.errored,
            still_pending = report.still_pending,
            deactivated = report.deactivated,
            "Receipt reconciliation finished"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        receipt: &PushReceiptRecord,
        status: &ReceiptStatus,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) {
        let id = receipt.receipt_id.as_str();
        match status {
            ReceiptStatus::Ok => match self.receipts.mark_ok(id, now).await {
                Ok(true) => report.ok += 1,
                Ok(false) => debug!(receipt_id = %id, "Receipt already settled"),
                Err(e) => {
                    error!(receipt_id = %id, "Failed to mark receipt ok: {}", e);
                    report.still_pending += 1;
                }
            },
            ReceiptStatus::Error { code, message } => {
                let transitioned = match self
                    .receipts
                    .mark_error(id, code.as_str(), message.as_deref(), now)
                    .await
                {
                    Ok(transitioned) => transitioned,
                    Err(e) => {
                        error!(receipt_id = %id, "Failed to mark receipt errored: {}", e);
                        report.still_pending += 1;
                        return;
                    }
                };
                if !transitioned {
                    debug!(receipt_id = %id, "Receipt already settled");
                    return;
                }

                report.errored += 1;
                if !code.is_permanent() {
                    // Message-level failure; the token itself is still good.
                    warn!(
                        receipt_id = %id,
                        identity = %receipt.identity,
                        code = code.as_str(),
                        "Delivery failed, token kept"
                    );
                    return;
                }
                warn!(
                    receipt_id = %id,
                    identity = %receipt.identity,
                    code = code.as_str(),
                    "Delivery failed, deactivating token"
                );
                match self.tokens.deactivate(&receipt.push_token).await {
                    Ok(rows) => report.deactivated += rows,
                    Err(e) => error!(receipt_id = %id, "Failed to deactivate token: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPushProvider;
    use crate::testing::temp_store;
    use civic_common::{Identity, Platform, PushErrorCode};
    use civic_db::{ReceiptState, Store, SubscriptionRepository};

    fn reconciler(store: &Store, provider: Arc<MockPushProvider>) -> ReceiptReconciler {
        ReceiptReconciler::new(
            provider,
            store.receipts.clone(),
            TokenLifecycleManager::new(store.subscriptions.clone()),
            &PushConfig::default(),
        )
    }

    async fn seed(store: &Store, user: &Identity, receipt_id: &str, token: &str, age_minutes: i64) {
        store
            .subscriptions
            .upsert_push_subscription(user.id(), token, Platform::Ios)
            .await
            .unwrap();
        store
            .receipts
            .insert_pending(receipt_id, user, token, Utc::now() - Duration::minutes(age_minutes))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_receipt_deactivates_exactly_its_token() {
        let store = temp_store().await;
        let provider = Arc::new(MockPushProvider::new());
        let user = Identity::user("u1");
        seed(&store, &user, "r-ok", "ExponentPushToken[a]", 30).await;
        seed(&store, &user, "r-bad", "ExponentPushToken[b]", 30).await;
        provider.fail_receipt("r-bad", PushErrorCode::DeviceNotRegistered);

        let report = reconciler(&store, provider.clone()).run().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.ok, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.deactivated, 1);
        let active = store.subscriptions.active_push_subscriptions("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].push_token, "ExponentPushToken[a]");
    }

    #[tokio::test]
    async fn test_message_level_error_keeps_token() {
        let store = temp_store().await;
        let provider = Arc::new(MockPushProvider::new());
        let user = Identity::user("u1");
        seed(&store, &user, "r-big", "ExponentPushToken[a]", 30).await;
        seed(&store, &user, "r-rate", "ExponentPushToken[b]", 30).await;
        provider.fail_receipt("r-big", PushErrorCode::MessageTooBig);
        provider.fail_receipt("r-rate", PushErrorCode::MessageRateExceeded);

        let report = reconciler(&store, provider.clone()).run().await.unwrap();

        assert_eq!(report.errored, 2);
        assert_eq!(report.deactivated, 0);
        let errored = store.receipts.find("r-big").await.unwrap().unwrap();
        assert_eq!(errored.status, ReceiptState::Error);
        assert_eq!(errored.error_type.as_deref(), Some("MessageTooBig"));
        assert_eq!(store.subscriptions.active_push_subscriptions("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_receipts_unaffected_by_second_pass() {
        let store = temp_store().await;
        let provider = Arc::new(MockPushProvider::new());
        let user = Identity::user("u1");
        seed(&store, &user, "r1", "ExponentPushToken[a]", 30).await;
        let reconciler = reconciler(&store, provider.clone());

        reconciler.run().await.unwrap();
        provider.fail_receipt("r1", PushErrorCode::DeviceNotRegistered);
        let second = reconciler.run().await.unwrap();

        assert_eq!(second, ReconcileReport::default());
        assert_eq!(store.receipts.find("r1").await.unwrap().unwrap().status, ReceiptState::Ok);
        assert_eq!(store.subscriptions.active_push_subscriptions("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grace_period_and_unready_receipts() {
        let store = temp_store().await;
        let provider = Arc::new(MockPushProvider::new());
        let user = Identity::user("u1");
        seed(&store, &user, "fresh", "ExponentPushToken[a]", 5).await;
        seed(&store, &user, "unready", "ExponentPushToken[b]", 30).await;
        provider.withhold_receipt("unready");

        let report = reconciler(&store, provider.clone()).run().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.still_pending, 1);
        assert_eq!(provider.receipt_lookups(), vec![vec!["unready".to_string()]]);
        assert_eq!(
            store.receipts.find("fresh").await.unwrap().unwrap().status,
            ReceiptState::Pending
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_receipts_pending_and_others_proceed() {
        let store = temp_store().await;
        let provider = Arc::new(MockPushProvider::new().with_receipt_batch_size(2));
        provider.fail_next_receipt_checks(1);
        let user = Identity::user("u1");
        for (i, age) in [50, 40, 30].into_iter().enumerate() {
            seed(&store, &user, &format!("r{}", i), &format!("ExponentPushToken[{}]", i), age).await;
        }

        let report = reconciler(&store, provider.clone()).run().await.unwrap();

        assert_eq!(provider.receipt_lookups().len(), 2);
        assert_eq!(report.still_pending, 2);
        assert_eq!(report.ok, 1);
        assert_eq!(
            store.receipts.find("r0").await.unwrap().unwrap().status,
            ReceiptState::Pending
        );
        assert_eq!(store.receipts.find("r2").await.unwrap().unwrap().status, ReceiptState::Ok);
    }
}
