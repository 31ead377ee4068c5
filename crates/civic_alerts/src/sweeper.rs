//! Retention sweeping
//!
//! Ledger rows go once they are older than the retention window, whether or
//! not the upstream event still exists. Receipts go once they are older than
//! the window and terminal; a pending receipt is never swept.

use chrono::{DateTime, Duration, Utc};
use civic_common::CivicError;
use civic_config::RetentionConfig;
use civic_db::{DedupLedger, ReceiptRepository, SqlDedupLedger, SqlReceiptRepository};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub triggered_alerts: u64,
    pub device_triggered_alerts: u64,
    pub receipts: u64,
}

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    ledger: SqlDedupLedger,
    receipts: SqlReceiptRepository,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(
        ledger: SqlDedupLedger,
        receipts: SqlReceiptRepository,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            ledger,
            receipts,
            retention: Duration::days(config.days.max(1)),
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, CivicError> {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, CivicError> {
        let cutoff = now - self.retention;

        let ledger = self.ledger.purge_before(cutoff).await?;
        let receipts = self.receipts.purge_terminal_before(cutoff).await?;

        let report = SweepReport {
            triggered_alerts: ledger.triggered_alerts,
            device_triggered_alerts: ledger.device_triggered_alerts,
            receipts,
        };
        info!(
            %cutoff,
            triggered_alerts = report.triggered_alerts,
            device_triggered_alerts = report.device_triggered_alerts,
            receipts = report.receipts,
            "Retention sweep finished"
        );
        Ok(report)
    }
}
