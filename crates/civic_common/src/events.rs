//! Candidate events produced by the upstream feed adapters.
//!
//! Each event carries a stable `source_id` used as the dedup discriminator and
//! a typed payload per alert type.

use crate::models::{AlertType, PushPayload};
use serde::{Deserialize, Serialize};

/// NWS alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeatherSeverity {
    Unknown,
    Minor,
    Moderate,
    Severe,
    Extreme,
}

/// Traffic incident severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficSeverity {
    Minor,
    Moderate,
    Major,
    Critical,
}

/// River gauge stage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiverStage {
    Normal,
    Action,
    Flood,
    Moderate,
    Major,
}

impl RiverStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiverStage::Normal => "normal",
            RiverStage::Action => "action",
            RiverStage::Flood => "flood",
            RiverStage::Moderate => "moderate",
            RiverStage::Major => "major",
        }
    }
}

/// Type-specific part of a candidate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventKind {
    Weather {
        severity: WeatherSeverity,
        #[serde(default)]
        event: Option<String>,
        #[serde(default)]
        area: Option<String>,
    },
    River {
        site_id: String,
        #[serde(default)]
        site_name: Option<String>,
        stage: RiverStage,
        #[serde(default)]
        gauge_height_ft: Option<f64>,
    },
    AirQuality {
        aqi: u32,
        #[serde(default)]
        location: Option<String>,
    },
    Traffic {
        severity: TrafficSeverity,
        #[serde(default)]
        road: Option<String>,
    },
    Digest {
        #[serde(default)]
        edition: Option<String>,
    },
}

impl EventKind {
    pub fn alert_type(&self) -> AlertType {
        match self {
            EventKind::Weather { .. } => AlertType::Weather,
            EventKind::River { .. } => AlertType::River,
            EventKind::AirQuality { .. } => AlertType::AirQuality,
            EventKind::Traffic { .. } => AlertType::Traffic,
            EventKind::Digest { .. } => AlertType::Digest,
        }
    }
}

/// A notification-worthy occurrence from an external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEvent {
    /// Stable key of the upstream occurrence
    pub source_id: String,
    pub title: String,
    pub body: String,
    pub kind: EventKind,
}

impl CandidateEvent {
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            body: body.into(),
            kind,
        }
    }

    pub fn alert_type(&self) -> AlertType {
        self.kind.alert_type()
    }

    /// The push payload announcing this event.
    pub fn payload(&self) -> PushPayload {
        PushPayload::new(&self.title, &self.body)
            .with_data("alertType", self.alert_type().as_str())
            .with_data("sourceId", &self.source_id)
    }

    /// JSON copy of the event kept alongside the ledger row.
    pub fn snapshot(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
