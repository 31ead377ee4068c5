//! Stable source ids for continuously measured conditions.
//!
//! River gauges and air quality monitors report a value on every poll. Their
//! source id is bucketed so that a sustained condition yields the same id all
//! day, while a change of stage or AQI category yields a new one.
//! [`HttpEventSource`](crate::source::HttpEventSource) applies
//! [`normalize_source_id`] to every fetched event, so feed adapters do not
//! have to build these ids themselves.

use chrono::{DateTime, Utc};
use civic_common::{CandidateEvent, EventKind, RiverStage};

/// `river:{site}:{stage}:{utc date}`
pub fn river_source_id(site_id: &str, stage: RiverStage, observed_at: DateTime<Utc>) -> String {
    format!(
        "river:{}:{}:{}",
        site_id,
        stage.as_str(),
        observed_at.format("%Y-%m-%d")
    )
}

/// EPA AQI category of a reading
pub fn aqi_category(aqi: u32) -> &'static str {
    match aqi {
        0..=50 => "good",
        51..=100 => "moderate",
        101..=150 => "unhealthy_sensitive",
        151..=200 => "unhealthy",
        201..=300 => "very_unhealthy",
        _ => "hazardous",
    }
}

/// `aqi:{location}:{category}:{utc date}`
pub fn air_quality_source_id(location: &str, aqi: u32, observed_at: DateTime<Utc>) -> String {
    format!(
        "aqi:{}:{}:{}",
        location.trim().to_lowercase().replace(' ', "-"),
        aqi_category(aqi),
        observed_at.format("%Y-%m-%d")
    )
}

/// Replace the source id of a river or air quality event with its bucketed
/// form. Other alert types keep the id their feed gave them.
///
/// An air quality event without a location is keyed by its original id.
pub fn normalize_source_id(event: &mut CandidateEvent, observed_at: DateTime<Utc>) {
    let normalized = match &event.kind {
        EventKind::River { site_id, stage, .. } => river_source_id(site_id, *stage, observed_at),
        EventKind::AirQuality { aqi, location } => {
            let location = location.as_deref().unwrap_or(&event.source_id);
            air_quality_source_id(location, *aqi, observed_at)
        }
        _ => return,
    };
    event.source_id = normalized;
}
