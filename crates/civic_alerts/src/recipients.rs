//! Users and anonymous devices behind one type.

use civic_common::{AlertConfig, AlertType, CivicError, Identity};
use civic_db::{SqlSubscriptionRepository, SubscriptionRepository};

/// Someone subscribed to an alert type, with the config to match against
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub identity: Identity,
    pub config: AlertConfig,
}

/// Everyone subscribed to `alert_type`.
///
/// Users come from their enabled alert subscriptions; devices from active
/// device rows whose flag for the type is set, with the default config.
pub async fn load_recipients(
    subscriptions: &SqlSubscriptionRepository,
    alert_type: AlertType,
) -> Result<Vec<Recipient>, CivicError> {
    let mut recipients = Vec::new();

    if alert_type.is_user_subscribable() {
        recipients.extend(
            subscriptions
                .enabled_alert_subscriptions(alert_type)
                .await?
                .into_iter()
                .map(|s| Recipient {
                    config: s.config(),
                    identity: Identity::User(s.user_id),
                }),
        );
    }

    recipients.extend(
        subscriptions
            .active_devices_for(alert_type)
            .await?
            .into_iter()
            .map(|d| Recipient {
                identity: Identity::Device(d.device_id),
                config: AlertConfig::default_for(alert_type),
            }),
    );

    Ok(recipients)
}
