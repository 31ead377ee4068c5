//! Repository for alert, device and push subscriptions
//!
//! Three tables describe who wants what and where to deliver it:
//!
//! * `alert_subscriptions` - one row per `(user_id, alert_type)` with the
//!   user's per-type config
//! * `device_subscriptions` - one row per anonymous device with its token and
//!   five opt-in flags
//! * `push_subscriptions` - one row per `(user_id, push_token)` for
//!   authenticated users with several devices
//!
//! Rows are only ever upserted or deactivated here; hard deletes happen on
//! explicit account or device removal.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use civic_common::{
    AlertConfig, AlertType, DevicePreferences, DeviceRegistration, Platform, PushTarget,
};

/// An authenticated user's subscription to one alert type
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSubscription {
    pub id: String,
    pub user_id: String,
    pub alert_type: AlertType,
    /// Raw stored JSON; interpret through [`AlertSubscription::config`]
    pub raw_config: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertSubscription {
    /// The typed config, falling back to defaults when the stored JSON is unusable.
    pub fn config(&self) -> AlertConfig {
        AlertConfig::parse_lenient(self.alert_type, &self.raw_config)
    }
}

/// An anonymous device with its single push token
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSubscription {
    pub device_id: String,
    pub push_token: String,
    pub platform: Platform,
    pub is_active: bool,
    pub preferences: DevicePreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceSubscription {
    pub fn target(&self) -> PushTarget {
        PushTarget::new(self.push_token.clone(), self.platform)
    }
}

/// One registered device token of an authenticated user
#[derive(Debug, Clone, PartialEq)]
pub struct PushSubscription {
    pub id: String,
    pub user_id: String,
    pub push_token: String,
    pub platform: Platform,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PushSubscription {
    pub fn target(&self) -> PushTarget {
        PushTarget::new(self.push_token.clone(), self.platform)
    }
}

/// Repository for subscriptions and the push tokens they reference
pub trait SubscriptionRepository {
    /// Create the three subscription tables if they don't exist
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Insert or update the user's subscription for `config`'s alert type
    fn upsert_alert_subscription(
        &self,
        user_id: &str,
        config: &AlertConfig,
        enabled: bool,
    ) -> impl std::future::Future<Output = Result<AlertSubscription, DbError>> + Send;

    /// Find the user's subscription for one alert type
    fn find_alert_subscription(
        &self,
        user_id: &str,
        alert_type: AlertType,
    ) -> impl std::future::Future<Output = Result<Option<AlertSubscription>, DbError>> + Send;

    /// All enabled user subscriptions of one alert type
    fn enabled_alert_subscriptions(
        &self,
        alert_type: AlertType,
    ) -> impl std::future::Future<Output = Result<Vec<AlertSubscription>, DbError>> + Send;

    /// Insert or update an anonymous device; the row becomes active
    fn upsert_device(
        &self,
        registration: &DeviceRegistration,
    ) -> impl std::future::Future<Output = Result<DeviceSubscription, DbError>> + Send;

    fn find_device(
        &self,
        device_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<DeviceSubscription>, DbError>> + Send;

    /// Active devices whose flag for `alert_type` is set
    fn active_devices_for(
        &self,
        alert_type: AlertType,
    ) -> impl std::future::Future<Output = Result<Vec<DeviceSubscription>, DbError>> + Send;

    /// Insert or reactivate a user's push token
    fn upsert_push_subscription(
        &self,
        user_id: &str,
        push_token: &str,
        platform: Platform,
    ) -> impl std::future::Future<Output = Result<PushSubscription, DbError>> + Send;

    /// All push subscriptions of a user, active or not
    fn push_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PushSubscription>, DbError>> + Send;

    /// Active push subscriptions of a user
    fn active_push_subscriptions(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PushSubscription>, DbError>> + Send;

    /// Mark every row referencing `push_token` inactive, in both token tables.
    ///
    /// Returns the number of rows that changed from active to inactive.
    fn deactivate_token(
        &self,
        push_token: &str,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;

    /// Mark all of a user's push subscriptions inactive
    fn deactivate_user_tokens(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;

    /// Mark an anonymous device inactive
    fn deactivate_device(
        &self,
        device_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;

    /// Remove an anonymous device entirely
    fn delete_device(
        &self,
        device_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Remove every subscription and token of a user (account deletion)
    fn delete_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;
}
