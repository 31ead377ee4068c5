//! SQL implementation of the receipt repository

use crate::error::DbError;
use crate::repositories::receipts::{PushReceiptRecord, ReceiptRepository};
use crate::time::{datetime_to_ms, ms_to_datetime};
use crate::DbClient;
use chrono::{DateTime, Utc};
use civic_common::Identity;
use sqlx::any::AnyRow;
use sqlx::{Any, Decode, Row, Type, ValueRef};
use tracing::{debug, error, info};

const RECEIPT_COLUMNS: &str = "receipt_id, user_id, device_id, push_token, status, \
     error_type, error_message, sent_at, checked_at";

/// SQL implementation of the receipt repository
#[derive(Debug, Clone)]
pub struct SqlReceiptRepository {
    db_client: DbClient,
}

impl SqlReceiptRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

/// Decode a nullable column. The Any driver refuses `Option<T>` on a NULL value.
fn nullable<'r, T>(row: &'r AnyRow, column: &str) -> Result<Option<T>, DbError>
where
    T: Decode<'r, Any> + Type<Any>,
{
    if row.try_get_raw(column)?.is_null() {
        return Ok(None);
    }
    Ok(Some(row.try_get(column)?))
}

fn receipt_from_row(row: &AnyRow) -> Result<PushReceiptRecord, DbError> {
    let receipt_id: String = row.try_get("receipt_id")?;
    let user_id: Option<String> = nullable(row, "user_id")?;
    let device_id: Option<String> = nullable(row, "device_id")?;
    let identity = match (user_id, device_id) {
        (Some(user_id), _) => Identity::User(user_id),
        (None, Some(device_id)) => Identity::Device(device_id),
        (None, None) => {
            return Err(DbError::DecodeError(format!(
                "receipt '{}' has neither user nor device",
                receipt_id
            )))
        }
    };
    let status: String = row.try_get("status")?;

    Ok(PushReceiptRecord {
        receipt_id,
        identity,
        push_token: row.try_get("push_token")?,
        status: status.parse()?,
        error_type: nullable(row, "error_type")?,
        error_message: nullable(row, "error_message")?,
        sent_at: ms_to_datetime(row.try_get("sent_at")?),
        checked_at: nullable::<i64>(row, "checked_at")?.map(ms_to_datetime),
    })
}

impl ReceiptRepository for SqlReceiptRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing push receipt schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS push_receipts (
                receipt_id TEXT PRIMARY KEY,
                user_id TEXT,
                device_id TEXT,
                push_token TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error_type TEXT,
                error_message TEXT,
                sent_at BIGINT NOT NULL,
                checked_at BIGINT
            )
        "#;
        self.db_client.execute(query).await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_push_receipts_status_sent_at \
                 ON push_receipts (status, sent_at)",
            )
            .await?;

        info!("Push receipt schema initialized successfully");
        Ok(())
    }

    async fn insert_pending(
        &self,
        receipt_id: &str,
        identity: &Identity,
        push_token: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let (user_id, device_id) = match identity {
            Identity::User(id) => (Some(id.as_str()), None),
            Identity::Device(id) => (None, Some(id.as_str())),
        };

        let result = sqlx::query(
            "INSERT INTO push_receipts (receipt_id, user_id, device_id, push_token, status, sent_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5) ON CONFLICT DO NOTHING",
        )
        .bind(receipt_id)
        .bind(user_id)
        .bind(device_id)
        .bind(push_token)
        .bind(datetime_to_ms(sent_at))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!(%receipt_id, "Failed to store pending receipt: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PushReceiptRecord>, DbError> {
        let query = format!(
            "SELECT {} FROM push_receipts WHERE status = 'pending' AND sent_at < $1 \
             ORDER BY sent_at LIMIT $2",
            RECEIPT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(datetime_to_ms(cutoff))
            .bind(limit)
            .fetch_all(self.db_client.pool())
            .await?;

        rows.iter().map(receipt_from_row).collect()
    }

    async fn mark_ok(&self, receipt_id: &str, checked_at: DateTime<Utc>) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE push_receipts SET status = 'ok', checked_at = $1 \
             WHERE receipt_id = $2 AND status = 'pending'",
        )
        .bind(datetime_to_ms(checked_at))
        .bind(receipt_id)
        .execute(self.db_client.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_error(
        &self,
        receipt_id: &str,
        error_type: &str,
        error_message: Option<&str>,
        checked_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE push_receipts SET status = 'error', error_type = $1, error_message = $2, \
             checked_at = $3 WHERE receipt_id = $4 AND status = 'pending'",
        )
        .bind(error_type)
        .bind(error_message)
        .bind(datetime_to_ms(checked_at))
        .bind(receipt_id)
        .execute(self.db_client.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, receipt_id: &str) -> Result<Option<PushReceiptRecord>, DbError> {
        let query = format!(
            "SELECT {} FROM push_receipts WHERE receipt_id = $1",
            RECEIPT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(receipt_id)
            .fetch_optional(self.db_client.pool())
            .await?;

        row.as_ref().map(receipt_from_row).transpose()
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM push_receipts WHERE sent_at < $1 AND status IN ('ok', 'error')",
        )
        .bind(datetime_to_ms(cutoff))
        .execute(self.db_client.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
