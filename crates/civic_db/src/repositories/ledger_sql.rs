//! SQL implementation of the dedup ledger

use crate::error::DbError;
use crate::repositories::ledger::{DedupLedger, LedgerPurge, TriggeredAlert};
use crate::time::{datetime_to_ms, ms_to_datetime};
use crate::DbClient;
use chrono::{DateTime, Utc};
use civic_common::{AlertType, Identity};
use sqlx::Row;
use tracing::{debug, error, info};

/// SQL implementation of the dedup ledger
#[derive(Debug, Clone)]
pub struct SqlDedupLedger {
    db_client: DbClient,
}

impl SqlDedupLedger {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

/// Table and key column holding the ledger rows of an identity
fn table_for(identity: &Identity) -> (&'static str, &'static str) {
    match identity {
        Identity::User(_) => ("triggered_alerts", "user_id"),
        Identity::Device(_) => ("device_triggered_alerts", "device_id"),
    }
}

impl DedupLedger for SqlDedupLedger {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing ledger schema");

        for (table, column) in [
            ("triggered_alerts", "user_id"),
            ("device_triggered_alerts", "device_id"),
        ] {
            let create = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    {column} TEXT NOT NULL,
                    alert_type TEXT NOT NULL,
                    source_id TEXT NOT NULL,
                    snapshot TEXT NOT NULL,
                    triggered_at BIGINT NOT NULL,
                    PRIMARY KEY ({column}, alert_type, source_id)
                )
                "#
            );
            self.db_client.execute(&create).await?;

            let index = format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_triggered_at ON {table} (triggered_at)"
            );
            self.db_client.execute(&index).await?;
        }

        info!("Ledger schema initialized successfully");
        Ok(())
    }

    async fn has_triggered(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> Result<bool, DbError> {
        let (table, column) = table_for(identity);
        let query = format!(
            "SELECT source_id FROM {} WHERE {} = $1 AND alert_type = $2 AND source_id = $3",
            table, column
        );
        let row = sqlx::query(&query)
            .bind(identity.id())
            .bind(alert_type.as_str())
            .bind(source_id)
            .fetch_optional(self.db_client.pool())
            .await?;

        Ok(row.is_some())
    }

    async fn record_triggered(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
        snapshot: &str,
    ) -> Result<bool, DbError> {
        self.record_triggered_at(identity, alert_type, source_id, snapshot, Utc::now())
            .await
    }

    async fn record_triggered_at(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
        snapshot: &str,
        triggered_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let (table, column) = table_for(identity);
        let query = format!(
            "INSERT INTO {} ({}, alert_type, source_id, snapshot, triggered_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
            table, column
        );

        let result = sqlx::query(&query)
            .bind(identity.id())
            .bind(alert_type.as_str())
            .bind(source_id)
            .bind(snapshot)
            .bind(datetime_to_ms(triggered_at))
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!(%identity, %alert_type, %source_id, "Failed to record triggered alert: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(%identity, %alert_type, %source_id, "Alert already recorded");
        }
        Ok(inserted)
    }

    async fn release(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> Result<bool, DbError> {
        let (table, column) = table_for(identity);
        let query = format!(
            "DELETE FROM {} WHERE {} = $1 AND alert_type = $2 AND source_id = $3",
            table, column
        );
        let result = sqlx::query(&query)
            .bind(identity.id())
            .bind(alert_type.as_str())
            .bind(source_id)
            .execute(self.db_client.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        source_id: &str,
    ) -> Result<Option<TriggeredAlert>, DbError> {
        let (table, column) = table_for(identity);
        let query = format!(
            "SELECT snapshot, triggered_at FROM {} \
             WHERE {} = $1 AND alert_type = $2 AND source_id = $3",
            table, column
        );
        let row = sqlx::query(&query)
            .bind(identity.id())
            .bind(alert_type.as_str())
            .bind(source_id)
            .fetch_optional(self.db_client.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(TriggeredAlert {
                identity: identity.clone(),
                alert_type,
                source_id: source_id.to_string(),
                snapshot: row.try_get("snapshot")?,
                triggered_at: ms_to_datetime(row.try_get("triggered_at")?),
            })),
            None => Ok(None),
        }
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<LedgerPurge, DbError> {
        let cutoff_ms = datetime_to_ms(cutoff);

        let triggered_alerts = sqlx::query("DELETE FROM triggered_alerts WHERE triggered_at < $1")
            .bind(cutoff_ms)
            .execute(self.db_client.pool())
            .await?
            .rows_affected();
        let device_triggered_alerts =
            sqlx::query("DELETE FROM device_triggered_alerts WHERE triggered_at < $1")
                .bind(cutoff_ms)
                .execute(self.db_client.pool())
                .await?
                .rows_affected();

        Ok(LedgerPurge {
            triggered_alerts,
            device_triggered_alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_db;
    use chrono::Duration;

    async fn ledger() -> SqlDedupLedger {
        let ledger = SqlDedupLedger::new(temp_db().await);
        ledger.init_schema().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let ledger = ledger().await;
        let user = Identity::user("u1");

        assert!(ledger
            .record_triggered(&user, AlertType::Weather, "nws-1", "{}")
            .await
            .unwrap());
        assert!(!ledger
            .record_triggered(&user, AlertType::Weather, "nws-1", "{}")
            .await
            .unwrap());
        assert!(ledger
            .has_triggered(&user, AlertType::Weather, "nws-1")
            .await
            .unwrap());

        let rows = sqlx::query("SELECT source_id FROM triggered_alerts")
            .fetch_all(ledger.db_client.pool())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_users_and_devices_are_separate_keys() {
        let ledger = ledger().await;
        let user = Identity::user("same");
        let device = Identity::device("same");

        assert!(ledger
            .record_triggered(&user, AlertType::Traffic, "t-1", "{}")
            .await
            .unwrap());
        assert!(!ledger
            .has_triggered(&device, AlertType::Traffic, "t-1")
            .await
            .unwrap());
        assert!(ledger
            .record_triggered(&device, AlertType::Traffic, "t-1", "{}")
            .await
            .unwrap());
        assert!(!ledger
            .has_triggered(&user, AlertType::Weather, "t-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_yield_one_winner() {
        let ledger = ledger().await;
        let identity = Identity::device("d1");

        let attempts = (0..8).map(|_| {
            let ledger = ledger.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                ledger
                    .record_triggered(&identity, AlertType::River, "river:1:flood:2026-10-18", "{}")
                    .await
                    .unwrap()
            })
        });

        let mut winners = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_allows_reclaim() {
        let ledger = ledger().await;
        let user = Identity::user("u1");

        assert!(ledger
            .record_triggered(&user, AlertType::AirQuality, "aq-1", r#"{"aqi":150}"#)
            .await
            .unwrap());
        let row = ledger
            .find(&user, AlertType::AirQuality, "aq-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.snapshot, r#"{"aqi":150}"#);

        assert!(ledger.release(&user, AlertType::AirQuality, "aq-1").await.unwrap());
        assert!(!ledger.release(&user, AlertType::AirQuality, "aq-1").await.unwrap());
        assert!(ledger
            .record_triggered(&user, AlertType::AirQuality, "aq-1", "{}")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_purge_respects_cutoff() {
        let ledger = ledger().await;
        let now = Utc::now();
        let cutoff = now - Duration::days(7);

        ledger
            .record_triggered_at(&Identity::user("old"), AlertType::Weather, "w", "{}", now - Duration::days(8))
            .await
            .unwrap();
        ledger
            .record_triggered_at(&Identity::user("recent"), AlertType::Weather, "w", "{}", now - Duration::days(6))
            .await
            .unwrap();
        ledger
            .record_triggered_at(&Identity::device("old"), AlertType::Digest, "d", "{}", now - Duration::days(8))
            .await
            .unwrap();

        let purged = ledger.purge_before(cutoff).await.unwrap();
        assert_eq!(
            purged,
            LedgerPurge {
                triggered_alerts: 1,
                device_triggered_alerts: 1
            }
        );
        assert!(ledger
            .has_triggered(&Identity::user("recent"), AlertType::Weather, "w")
            .await
            .unwrap());
        assert_eq!(ledger.purge_before(cutoff).await.unwrap(), LedgerPurge::default());
    }
}
