//! Push token lifecycle
//!
//! A token is active from registration until the provider reports it dead or
//! its owner deregisters. Inactive tokens are never handed to the provider
//! again until a new registration reactivates them.

use civic_common::{CivicError, DeviceRegistration, Identity, Platform, PushTarget};
use civic_db::{DeviceSubscription, SqlSubscriptionRepository, SubscriptionRepository};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TokenLifecycleManager {
    subscriptions: SqlSubscriptionRepository,
}

impl TokenLifecycleManager {
    pub fn new(subscriptions: SqlSubscriptionRepository) -> Self {
        Self { subscriptions }
    }

    /// Mark every row referencing `token` inactive. Idempotent; returns the
    /// number of rows that were active before the call.
    pub async fn deactivate(&self, token: &str) -> Result<u64, CivicError> {
        let changed = self.subscriptions.deactivate_token(token).await?;
        if changed > 0 {
            info!(rows = changed, "Push token deactivated");
        } else {
            debug!("Push token already inactive");
        }
        Ok(changed)
    }

    /// Insert or reactivate a token for an identity.
    ///
    /// A device keeps its preferences when only its token changes; an
    /// unknown device is created with every alert type enabled.
    pub async fn upsert(
        &self,
        identity: &Identity,
        token: &str,
        platform: Platform,
    ) -> Result<(), CivicError> {
        match identity {
            Identity::User(user_id) => {
                self.subscriptions
                    .upsert_push_subscription(user_id, token, platform)
                    .await?;
            }
            Identity::Device(device_id) => {
                let mut registration = DeviceRegistration::new(device_id, token, platform);
                if let Some(existing) = self.subscriptions.find_device(device_id).await? {
                    registration = registration.with_preferences(existing.preferences);
                }
                self.subscriptions.upsert_device(&registration).await?;
            }
        }
        debug!(%identity, "Push token registered");
        Ok(())
    }

    /// Register an anonymous device with its preferences; the device becomes active.
    pub async fn register_device(
        &self,
        registration: &DeviceRegistration,
    ) -> Result<DeviceSubscription, CivicError> {
        Ok(self.subscriptions.upsert_device(registration).await?)
    }

    /// Deactivate every token of an identity
    pub async fn deregister(&self, identity: &Identity) -> Result<u64, CivicError> {
        let changed = match identity {
            Identity::User(user_id) => self.subscriptions.deactivate_user_tokens(user_id).await?,
            Identity::Device(device_id) => self.subscriptions.deactivate_device(device_id).await?,
        };
        info!(%identity, rows = changed, "Identity deregistered");
        Ok(changed)
    }

    /// The identity's active tokens, the only ones that may be dispatched to
    pub async fn active_targets(&self, identity: &Identity) -> Result<Vec<PushTarget>, CivicError> {
        let targets: Vec<PushTarget> = match identity {
            Identity::User(user_id) => self
                .subscriptions
                .active_push_subscriptions(user_id)
                .await?
                .iter()
                .map(|s| s.target())
                .collect(),
            Identity::Device(device_id) => self
                .subscriptions
                .find_device(device_id)
                .await?
                .filter(|d| d.is_active)
                .map(|d| vec![d.target()])
                .unwrap_or_default(),
        };
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_store;
    use civic_common::{AlertType, DevicePreferences};

    #[tokio::test]
    async fn test_deactivated_token_is_not_a_target_until_reregistered() {
        let store = temp_store().await;
        let tokens = TokenLifecycleManager::new(store.subscriptions.clone());
        let user = Identity::user("u1");

        tokens
            .upsert(&user, "ExponentPushToken[a]", Platform::Ios)
            .await
            .unwrap();
        tokens
            .upsert(&user, "ExponentPushToken[b]", Platform::Android)
            .await
            .unwrap();
        assert_eq!(tokens.active_targets(&user).await.unwrap().len(), 2);

        assert_eq!(tokens.deactivate("ExponentPushToken[a]").await.unwrap(), 1);
        assert_eq!(tokens.deactivate("ExponentPushToken[a]").await.unwrap(), 0);
        assert_eq!(
            tokens.active_targets(&user).await.unwrap(),
            vec![PushTarget::new("ExponentPushToken[b]", Platform::Android)]
        );

        tokens
            .upsert(&user, "ExponentPushToken[a]", Platform::Ios)
            .await
            .unwrap();
        assert_eq!(tokens.active_targets(&user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_token_refresh_keeps_preferences() {
        let store = temp_store().await;
        let tokens = TokenLifecycleManager::new(store.subscriptions.clone());
        let prefs = DevicePreferences {
            notify_digest: false,
            ..DevicePreferences::default()
        };

        tokens
            .register_device(
                &DeviceRegistration::new("d1", "ExponentPushToken[old]", Platform::Ios)
                    .with_preferences(prefs),
            )
            .await
            .unwrap();
        tokens
            .upsert(&Identity::device("d1"), "ExponentPushToken[new]", Platform::Ios)
            .await
            .unwrap();

        let device = store.subscriptions.find_device("d1").await.unwrap().unwrap();
        assert_eq!(device.push_token, "ExponentPushToken[new]");
        assert!(!device.preferences.wants(AlertType::Digest));
    }

    #[tokio::test]
    async fn test_deregister_device() {
        let store = temp_store().await;
        let tokens = TokenLifecycleManager::new(store.subscriptions.clone());
        let device = Identity::device("d1");

        tokens
            .upsert(&device, "ExponentPushToken[a]", Platform::Web)
            .await
            .unwrap();
        assert_eq!(tokens.deregister(&device).await.unwrap(), 1);
        assert!(tokens.active_targets(&device).await.unwrap().is_empty());
    }
}
