// --- File: crates/civic_common/src/models.rs ---

// Identity, alert type and push target types shared by every crate.

use crate::error::{validation_error, CivicError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The kinds of notification the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Weather,
    River,
    AirQuality,
    Traffic,
    Digest,
}

impl AlertType {
    /// Every alert type, in scheduling order.
    pub const ALL: [AlertType; 5] = [
        AlertType::Weather,
        AlertType::River,
        AlertType::AirQuality,
        AlertType::Traffic,
        AlertType::Digest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Weather => "weather",
            AlertType::River => "river",
            AlertType::AirQuality => "air_quality",
            AlertType::Traffic => "traffic",
            AlertType::Digest => "digest",
        }
    }

    /// Whether authenticated users can hold an alert subscription of this type.
    ///
    /// Digests are only delivered to anonymous devices that opted in.
    pub fn is_user_subscribable(&self) -> bool {
        !matches!(self, AlertType::Digest)
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(AlertType::Weather),
            "river" => Ok(AlertType::River),
            "air_quality" => Ok(AlertType::AirQuality),
            "traffic" => Ok(AlertType::Traffic),
            "digest" => Ok(AlertType::Digest),
            other => Err(validation_error(format!("unknown alert type: {}", other))),
        }
    }
}

/// Who gets notified: an authenticated user or an anonymous device.
///
/// This is the dedup key of the ledger. A user owning several devices is still
/// a single identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    User(String),
    Device(String),
}

impl Identity {
    pub fn user(id: impl Into<String>) -> Self {
        Identity::User(id.into())
    }

    pub fn device(id: impl Into<String>) -> Self {
        Identity::Device(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Identity::User(id) | Identity::Device(id) => id,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Device(id) => write!(f, "device:{}", id),
        }
    }
}

/// Client platform a push token was registered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            other => Err(validation_error(format!("unknown platform: {}", other))),
        }
    }
}

/// Per-type opt-in flags of an anonymous device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePreferences {
    pub notify_weather: bool,
    pub notify_river: bool,
    pub notify_air_quality: bool,
    pub notify_traffic: bool,
    pub notify_digest: bool,
}

impl Default for DevicePreferences {
    fn default() -> Self {
        Self {
            notify_weather: true,
            notify_river: true,
            notify_air_quality: true,
            notify_traffic: true,
            notify_digest: true,
        }
    }
}

impl DevicePreferences {
    /// The flag that plays the role of `enabled` for the given type.
    pub fn wants(&self, alert_type: AlertType) -> bool {
        match alert_type {
            AlertType::Weather => self.notify_weather,
            AlertType::River => self.notify_river,
            AlertType::AirQuality => self.notify_air_quality,
            AlertType::Traffic => self.notify_traffic,
            AlertType::Digest => self.notify_digest,
        }
    }
}

/// Represents an anonymous device registration
///
/// Sent by clients on first launch and whenever the push token or the
/// preferences change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Locally generated device id
    pub device_id: String,

    /// The push token issued to the device
    pub push_token: String,

    pub platform: Platform,

    #[serde(flatten)]
    pub preferences: DevicePreferences,
}

impl DeviceRegistration {
    /// Create a new device registration with every alert type enabled
    pub fn new(device_id: impl Into<String>, push_token: impl Into<String>, platform: Platform) -> Self {
        Self {
            device_id: device_id.into(),
            push_token: push_token.into(),
            platform,
            preferences: DevicePreferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: DevicePreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

/// A deliverable push token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTarget {
    pub token: String,
    pub platform: Platform,
}

impl PushTarget {
    pub fn new(token: impl Into<String>, platform: Platform) -> Self {
        Self {
            token: token.into(),
            platform,
        }
    }
}

/// The notification shown on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Custom key-value data delivered to the app
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_round_trips_through_db_names() {
        for alert_type in AlertType::ALL {
            assert_eq!(alert_type.as_str().parse::<AlertType>().unwrap(), alert_type);
        }
        assert!("tornado".parse::<AlertType>().is_err());
    }

    #[test]
    fn test_digest_is_device_only() {
        assert!(!AlertType::Digest.is_user_subscribable());
        assert!(AlertType::AirQuality.is_user_subscribable());
    }

    #[test]
    fn test_device_registration_flattens_preferences() {
        let json = r#"{
            "deviceId": "dev-1",
            "pushToken": "ExponentPushToken[abc]",
            "platform": "ios",
            "notifyWeather": true,
            "notifyRiver": false,
            "notifyAirQuality": true,
            "notifyTraffic": false,
            "notifyDigest": true
        }"#;
        let registration: DeviceRegistration = serde_json::from_str(json).unwrap();

        assert_eq!(registration.platform, Platform::Ios);
        assert!(registration.preferences.wants(AlertType::Weather));
        assert!(!registration.preferences.wants(AlertType::River));
        assert!(registration.preferences.wants(AlertType::Digest));
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::user("u1").to_string(), "user:u1");
        assert_eq!(Identity::device("d1").to_string(), "device:d1");
    }
}
