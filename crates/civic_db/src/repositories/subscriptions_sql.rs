//! SQL implementation of the subscription repository

use crate::error::DbError;
use crate::repositories::subscriptions::{
    AlertSubscription, DeviceSubscription, PushSubscription, SubscriptionRepository,
};
use crate::time::{datetime_to_ms, ms_to_datetime};
use crate::DbClient;
use chrono::Utc;
use civic_common::{AlertConfig, AlertType, DevicePreferences, DeviceRegistration, Platform};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};
use uuid::Uuid;

const ALERT_SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, alert_type, config, enabled, created_at, updated_at";

const DEVICE_COLUMNS: &str = "device_id, push_token, platform, is_active, notify_weather, \
     notify_river, notify_air_quality, notify_traffic, notify_digest, created_at, updated_at";

const PUSH_SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, push_token, platform, is_active, created_at, updated_at";

/// SQL implementation of the subscription repository
#[derive(Debug, Clone)]
pub struct SqlSubscriptionRepository {
    db_client: DbClient,
}

impl SqlSubscriptionRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn flag(value: bool) -> i64 {
    i64::from(value)
}

/// Device opt-in column for an alert type. Only ever interpolated from this fixed list.
fn preference_column(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::Weather => "notify_weather",
        AlertType::River => "notify_river",
        AlertType::AirQuality => "notify_air_quality",
        AlertType::Traffic => "notify_traffic",
        AlertType::Digest => "notify_digest",
    }
}

fn parse_platform(value: &str) -> Result<Platform, DbError> {
    value
        .parse()
        .map_err(|_| DbError::DecodeError(format!("unknown platform '{}'", value)))
}

fn alert_subscription_from_row(row: &AnyRow) -> Result<AlertSubscription, DbError> {
    let alert_type: String = row.try_get("alert_type")?;
    let alert_type = alert_type
        .parse()
        .map_err(|_| DbError::DecodeError(format!("unknown alert type '{}'", alert_type)))?;

    Ok(AlertSubscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        alert_type,
        raw_config: row.try_get("config")?,
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        created_at: ms_to_datetime(row.try_get("created_at")?),
        updated_at: ms_to_datetime(row.try_get("updated_at")?),
    })
}

fn device_from_row(row: &AnyRow) -> Result<DeviceSubscription, DbError> {
    let platform: String = row.try_get("platform")?;
    Ok(DeviceSubscription {
        device_id: row.try_get("device_id")?,
        push_token: row.try_get("push_token")?,
        platform: parse_platform(&platform)?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        preferences: DevicePreferences {
            notify_weather: row.try_get::<i64, _>("notify_weather")? != 0,
            notify_river: row.try_get::<i64, _>("notify_river")? != 0,
            notify_air_quality: row.try_get::<i64, _>("notify_air_quality")? != 0,
            notify_traffic: row.try_get::<i64, _>("notify_traffic")? != 0,
            notify_digest: row.try_get::<i64, _>("notify_digest")? != 0,
        },
        created_at: ms_to_datetime(row.try_get("created_at")?),
        updated_at: ms_to_datetime(row.try_get("updated_at")?),
    })
}

fn push_subscription_from_row(row: &AnyRow) -> Result<PushSubscription, DbError> {
    let platform: String = row.try_get("platform")?;
    Ok(PushSubscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        push_token: row.try_get("push_token")?,
        platform: parse_platform(&platform)?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: ms_to_datetime(row.try_get("created_at")?),
        updated_at: ms_to_datetime(row.try_get("updated_at")?),
    })
}

impl SubscriptionRepository for SqlSubscriptionRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing subscription schema");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS alert_subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                config TEXT NOT NULL,
                enabled BIGINT NOT NULL DEFAULT 1,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE(user_id, alert_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS device_subscriptions (
                device_id TEXT PRIMARY KEY,
                push_token TEXT NOT NULL,
                platform TEXT NOT NULL,
                is_active BIGINT NOT NULL DEFAULT 1,
                notify_weather BIGINT NOT NULL DEFAULT 1,
                notify_river BIGINT NOT NULL DEFAULT 1,
                notify_air_quality BIGINT NOT NULL DEFAULT 1,
                notify_traffic BIGINT NOT NULL DEFAULT 1,
                notify_digest BIGINT NOT NULL DEFAULT 1,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                push_token TEXT NOT NULL,
                platform TEXT NOT NULL,
                is_active BIGINT NOT NULL DEFAULT 1,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE(user_id, push_token)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_push_subscriptions_token ON push_subscriptions (push_token)",
            "CREATE INDEX IF NOT EXISTS idx_device_subscriptions_token ON device_subscriptions (push_token)",
        ];

        for statement in statements {
            self.db_client.execute(statement).await?;
        }

        info!("Subscription schema initialized successfully");
        Ok(())
    }

    async fn upsert_alert_subscription(
        &self,
        user_id: &str,
        config: &AlertConfig,
        enabled: bool,
    ) -> Result<AlertSubscription, DbError> {
        let alert_type = config.alert_type();
        if !alert_type.is_user_subscribable() {
            return Err(DbError::QueryError(format!(
                "alert type '{}' cannot be subscribed to by users",
                alert_type
            )));
        }
        debug!(%user_id, %alert_type, "Upserting alert subscription");

        let now = datetime_to_ms(Utc::now());
        let query = r#"
            INSERT INTO alert_subscriptions (id, user_id, alert_type, config, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT(user_id, alert_type) DO UPDATE SET
                config = excluded.config,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
        "#;

        sqlx::query(query)
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(alert_type.as_str())
            .bind(config.to_json())
            .bind(flag(enabled))
            .bind(now)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to upsert alert subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        self.find_alert_subscription(user_id, alert_type)
            .await?
            .ok_or_else(|| DbError::QueryError("alert subscription vanished after upsert".into()))
    }

    async fn find_alert_subscription(
        &self,
        user_id: &str,
        alert_type: AlertType,
    ) -> Result<Option<AlertSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM alert_subscriptions WHERE user_id = $1 AND alert_type = $2",
            ALERT_SUBSCRIPTION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(alert_type.as_str())
            .fetch_optional(self.db_client.pool())
            .await?;

        row.as_ref().map(alert_subscription_from_row).transpose()
    }

    async fn enabled_alert_subscriptions(
        &self,
        alert_type: AlertType,
    ) -> Result<Vec<AlertSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM alert_subscriptions WHERE alert_type = $1 AND enabled = 1 ORDER BY user_id",
            ALERT_SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(alert_type.as_str())
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load {} subscriptions: {}", alert_type, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(alert_subscription_from_row).collect()
    }

    async fn upsert_device(
        &self,
        registration: &DeviceRegistration,
    ) -> Result<DeviceSubscription, DbError> {
        debug!(device_id = %registration.device_id, "Upserting device subscription");

        let prefs = &registration.preferences;
        let now = datetime_to_ms(Utc::now());
        let query = r#"
            INSERT INTO device_subscriptions (
                device_id, push_token, platform, is_active,
                notify_weather, notify_river, notify_air_quality, notify_traffic, notify_digest,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, 1, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT(device_id) DO UPDATE SET
                push_token = excluded.push_token,
                platform = excluded.platform,
                is_active = 1,
                notify_weather = excluded.notify_weather,
                notify_river = excluded.notify_river,
                notify_air_quality = excluded.notify_air_quality,
                notify_traffic = excluded.notify_traffic,
                notify_digest = excluded.notify_digest,
                updated_at = excluded.updated_at
        "#;

        sqlx::query(query)
            .bind(&registration.device_id)
            .bind(&registration.push_token)
            .bind(registration.platform.as_str())
            .bind(flag(prefs.notify_weather))
            .bind(flag(prefs.notify_river))
            .bind(flag(prefs.notify_air_quality))
            .bind(flag(prefs.notify_traffic))
            .bind(flag(prefs.notify_digest))
            .bind(now)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to upsert device subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        self.find_device(&registration.device_id)
            .await?
            .ok_or_else(|| DbError::QueryError("device subscription vanished after upsert".into()))
    }

    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM device_subscriptions WHERE device_id = $1",
            DEVICE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(device_id)
            .fetch_optional(self.db_client.pool())
            .await?;

        row.as_ref().map(device_from_row).transpose()
    }

    async fn active_devices_for(
        &self,
        alert_type: AlertType,
    ) -> Result<Vec<DeviceSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM device_subscriptions WHERE is_active = 1 AND {} = 1 ORDER BY device_id",
            DEVICE_COLUMNS,
            preference_column(alert_type)
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load devices for {}: {}", alert_type, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(device_from_row).collect()
    }

    async fn upsert_push_subscription(
        &self,
        user_id: &str,
        push_token: &str,
        platform: Platform,
    ) -> Result<PushSubscription, DbError> {
        debug!(%user_id, "Upserting push subscription");

        let now = datetime_to_ms(Utc::now());
        let query = r#"
            INSERT INTO push_subscriptions (id, user_id, push_token, platform, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $5)
            ON CONFLICT(user_id, push_token) DO UPDATE SET
                platform = excluded.platform,
                is_active = 1,
                updated_at = excluded.updated_at
        "#;

        sqlx::query(query)
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(push_token)
            .bind(platform.as_str())
            .bind(now)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to upsert push subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let query = format!(
            "SELECT {} FROM push_subscriptions WHERE user_id = $1 AND push_token = $2",
            PUSH_SUBSCRIPTION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(push_token)
            .fetch_one(self.db_client.pool())
            .await?;

        push_subscription_from_row(&row)
    }

    async fn push_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM push_subscriptions WHERE user_id = $1 ORDER BY created_at, push_token",
            PUSH_SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(self.db_client.pool())
            .await?;

        rows.iter().map(push_subscription_from_row).collect()
    }

    async fn active_push_subscriptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscription>, DbError> {
        let query = format!(
            "SELECT {} FROM push_subscriptions WHERE user_id = $1 AND is_active = 1 \
             ORDER BY created_at, push_token",
            PUSH_SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(self.db_client.pool())
            .await?;

        rows.iter().map(push_subscription_from_row).collect()
    }

    async fn deactivate_token(&self, push_token: &str) -> Result<u64, DbError> {
        let now = datetime_to_ms(Utc::now());
        let mut changed = 0;

        for table in ["push_subscriptions", "device_subscriptions"] {
            let query = format!(
                "UPDATE {} SET is_active = 0, updated_at = $1 WHERE push_token = $2 AND is_active = 1",
                table
            );
            let result = sqlx::query(&query)
                .bind(now)
                .bind(push_token)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| {
                    error!("Failed to deactivate token in {}: {}", table, e);
                    DbError::QueryError(e.to_string())
                })?;
            changed += result.rows_affected();
        }

        if changed > 0 {
            info!(rows = changed, "Deactivated push token");
        }
        Ok(changed)
    }

    async fn deactivate_user_tokens(&self, user_id: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET is_active = 0, updated_at = $1 \
             WHERE user_id = $2 AND is_active = 1",
        )
        .bind(datetime_to_ms(Utc::now()))
        .bind(user_id)
        .execute(self.db_client.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate_device(&self, device_id: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE device_subscriptions SET is_active = 0, updated_at = $1 \
             WHERE device_id = $2 AND is_active = 1",
        )
        .bind(datetime_to_ms(Utc::now()))
        .bind(device_id)
        .execute(self.db_client.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_device(&self, device_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM device_subscriptions WHERE device_id = $1")
            .bind(device_id)
            .execute(self.db_client.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, DbError> {
        let mut tx = self.db_client.pool().begin().await?;

        let subscriptions = sqlx::query("DELETE FROM alert_subscriptions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let tokens = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!(%user_id, subscriptions, tokens, "Deleted user subscriptions");
        Ok(subscriptions + tokens)
    }
}
