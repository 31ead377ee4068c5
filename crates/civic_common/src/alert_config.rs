//! Per-type subscription configuration.
//!
//! The stored JSON of an alert subscription is interpreted according to the
//! subscription's alert type. Registration uses [`AlertConfig::parse_strict`];
//! reads of stored rows use [`AlertConfig::parse_lenient`], which never fails.

use crate::error::{validation_error, CivicError};
use crate::events::{RiverStage, TrafficSeverity, WeatherSeverity};
use crate::models::AlertType;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

/// Highest value on the AQI scale.
pub const MAX_AQI: u32 = 500;

pub const DEFAULT_WEATHER_SEVERITIES: [WeatherSeverity; 3] = [
    WeatherSeverity::Moderate,
    WeatherSeverity::Severe,
    WeatherSeverity::Extreme,
];
pub const DEFAULT_RIVER_STAGES: [RiverStage; 2] = [RiverStage::Action, RiverStage::Flood];
pub const DEFAULT_MIN_AQI: u32 = 101;
pub const DEFAULT_TRAFFIC_SEVERITIES: [TrafficSeverity; 2] =
    [TrafficSeverity::Major, TrafficSeverity::Critical];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeatherConfig {
    pub severities: Vec<WeatherSeverity>,
}

impl WeatherConfig {
    /// Configured severities, or the defaults when none are set.
    pub fn effective_severities(&self) -> &[WeatherSeverity] {
        if self.severities.is_empty() {
            &DEFAULT_WEATHER_SEVERITIES
        } else {
            &self.severities
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiverConfig {
    /// Gauge sites to watch; empty means every site.
    pub site_ids: Vec<String>,
    pub stages: Vec<RiverStage>,
}

impl RiverConfig {
    pub fn effective_stages(&self) -> &[RiverStage] {
        if self.stages.is_empty() {
            &DEFAULT_RIVER_STAGES
        } else {
            &self.stages
        }
    }

    pub fn watches_site(&self, site_id: &str) -> bool {
        self.site_ids.is_empty() || self.site_ids.iter().any(|s| s == site_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirQualityConfig {
    pub min_aqi: Option<u32>,
}

impl AirQualityConfig {
    pub fn effective_min_aqi(&self) -> u32 {
        self.min_aqi.unwrap_or(DEFAULT_MIN_AQI)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficConfig {
    pub severities: Vec<TrafficSeverity>,
}

impl TrafficConfig {
    pub fn effective_severities(&self) -> &[TrafficSeverity] {
        if self.severities.is_empty() {
            &DEFAULT_TRAFFIC_SEVERITIES
        } else {
            &self.severities
        }
    }
}

/// Subscription configuration, one variant per alert type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertConfig {
    Weather(WeatherConfig),
    River(RiverConfig),
    AirQuality(AirQualityConfig),
    Traffic(TrafficConfig),
    Digest,
}

impl AlertConfig {
    /// The configuration every anonymous device, and every empty config, uses.
    pub fn default_for(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::Weather => AlertConfig::Weather(WeatherConfig::default()),
            AlertType::River => AlertConfig::River(RiverConfig::default()),
            AlertType::AirQuality => AlertConfig::AirQuality(AirQualityConfig::default()),
            AlertType::Traffic => AlertConfig::Traffic(TrafficConfig::default()),
            AlertType::Digest => AlertConfig::Digest,
        }
    }

    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertConfig::Weather(_) => AlertType::Weather,
            AlertConfig::River(_) => AlertType::River,
            AlertConfig::AirQuality(_) => AlertType::AirQuality,
            AlertConfig::Traffic(_) => AlertType::Traffic,
            AlertConfig::Digest => AlertType::Digest,
        }
    }

    /// Parse a config submitted at registration, rejecting malformed input.
    pub fn parse_strict(alert_type: AlertType, json: &str) -> Result<Self, CivicError> {
        let json = if json.trim().is_empty() { "{}" } else { json };
        let config = match alert_type {
            AlertType::Weather => AlertConfig::Weather(parse_section(alert_type, json)?),
            AlertType::River => AlertConfig::River(parse_section(alert_type, json)?),
            AlertType::AirQuality => AlertConfig::AirQuality(parse_section(alert_type, json)?),
            AlertType::Traffic => AlertConfig::Traffic(parse_section(alert_type, json)?),
            AlertType::Digest => AlertConfig::Digest,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a stored config. Anything unusable falls back to the defaults.
    pub fn parse_lenient(alert_type: AlertType, json: &str) -> Self {
        match Self::parse_strict(alert_type, json) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    alert_type = %alert_type,
                    error = %err,
                    "Stored alert config unusable, falling back to defaults"
                );
                Self::default_for(alert_type)
            }
        }
    }

    /// Serialize the type-specific section for storage.
    pub fn to_json(&self) -> String {
        let value = match self {
            AlertConfig::Weather(c) => serde_json::to_value(c),
            AlertConfig::River(c) => serde_json::to_value(c),
            AlertConfig::AirQuality(c) => serde_json::to_value(c),
            AlertConfig::Traffic(c) => serde_json::to_value(c),
            AlertConfig::Digest => Ok(serde_json::json!({})),
        };
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "{}".to_string())
    }

    fn validate(&self) -> Result<(), CivicError> {
        if let AlertConfig::AirQuality(c) = self {
            if let Some(min_aqi) = c.min_aqi {
                if min_aqi > MAX_AQI {
                    return Err(validation_error(format!(
                        "minAqi must be at most {}, got {}",
                        MAX_AQI, min_aqi
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_section<T: DeserializeOwned>(alert_type: AlertType, json: &str) -> Result<T, CivicError> {
    serde_json::from_str(json)
        .map_err(|e| validation_error(format!("invalid {} config: {}", alert_type, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parses_to_defaults() {
        assert_eq!(
            AlertConfig::parse_strict(AlertType::Weather, "{}").unwrap(),
            AlertConfig::default_for(AlertType::Weather)
        );
        assert_eq!(
            AlertConfig::parse_strict(AlertType::River, "").unwrap(),
            AlertConfig::default_for(AlertType::River)
        );
    }

    #[test]
    fn test_strict_rejects_unknown_severity() {
        let err = AlertConfig::parse_strict(AlertType::Traffic, r#"{"severities": ["apocalyptic"]}"#)
            .unwrap_err();
        assert!(matches!(err, CivicError::ValidationError(_)));
    }

    #[test]
    fn test_strict_rejects_out_of_range_aqi() {
        assert!(AlertConfig::parse_strict(AlertType::AirQuality, r#"{"minAqi": 900}"#).is_err());
        assert!(AlertConfig::parse_strict(AlertType::AirQuality, r#"{"minAqi": 151}"#).is_ok());
    }

    #[test]
    fn test_lenient_falls_back_on_garbage() {
        let config = AlertConfig::parse_lenient(AlertType::Weather, "not json at all");
        assert_eq!(config, AlertConfig::default_for(AlertType::Weather));

        let config = AlertConfig::parse_lenient(AlertType::River, r#"{"stages": "flood"}"#);
        assert_eq!(config, AlertConfig::default_for(AlertType::River));
    }

    #[test]
    fn test_lenient_keeps_valid_config() {
        let config = AlertConfig::parse_lenient(
            AlertType::River,
            r#"{"siteIds": ["06486000"], "stages": ["action", "flood"]}"#,
        );
        match config {
            AlertConfig::River(river) => {
                assert!(river.watches_site("06486000"));
                assert!(!river.watches_site("06610000"));
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_to_json_round_trips() {
        let config = AlertConfig::AirQuality(AirQualityConfig { min_aqi: Some(151) });
        let json = config.to_json();
        assert_eq!(AlertConfig::parse_strict(AlertType::AirQuality, &json).unwrap(), config);
    }
}
