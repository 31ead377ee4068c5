//! Upstream feeds
//!
//! Each alert type is fed by an adapter service that normalises its
//! upstream (NWS alerts, USGS gauges, AirNow, 511 traffic, the digest
//! publisher) into a JSON array of candidate events.

use crate::source_id::normalize_source_id;
use chrono::Utc;
use civic_common::{
    external_service_error, AlertType, BoxFuture, CandidateEvent, CivicError, EventSource,
};
use civic_config::FeedsConfig;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches candidate events of one alert type from a feed adapter URL
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    alert_type: AlertType,
    url: String,
    client: Client,
}

impl HttpEventSource {
    pub fn new(alert_type: AlertType, url: impl Into<String>, timeout: Duration) -> Result<Self, CivicError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| external_service_error("feed", e))?;

        Ok(Self {
            alert_type,
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_events(&self) -> Result<Vec<CandidateEvent>, CivicError> {
        debug!(alert_type = %self.alert_type, url = %self.url, "Fetching feed");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                CivicError::TimeoutError(format!("{} feed: {}", self.alert_type, e))
            } else {
                external_service_error(&format!("{} feed", self.alert_type), e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(external_service_error(
                &format!("{} feed", self.alert_type),
                format!("status {}", status),
            ));
        }

        let events: Vec<CandidateEvent> = response
            .json()
            .await
            .map_err(|e| CivicError::ParseError(format!("{} feed: {}", self.alert_type, e)))?;

        let total = events.len();
        let fetched_at = Utc::now();
        let events: Vec<CandidateEvent> = events
            .into_iter()
            .filter(|e| e.alert_type() == self.alert_type)
            .map(|mut e| {
                normalize_source_id(&mut e, fetched_at);
                e
            })
            .collect();
        if events.len() != total {
            warn!(
                alert_type = %self.alert_type,
                dropped = total - events.len(),
                "Feed returned events of another alert type"
            );
        }
        Ok(events)
    }
}

impl EventSource for HttpEventSource {
    fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    fn fetch(&self) -> BoxFuture<'_, Vec<CandidateEvent>, CivicError> {
        Box::pin(self.fetch_events())
    }
}

/// One source per alert type that has a feed URL configured
pub fn sources_from_config(
    feeds: &FeedsConfig,
    timeout: Duration,
) -> Result<Vec<Arc<dyn EventSource>>, CivicError> {
    let configured = [
        (AlertType::Weather, &feeds.weather_url),
        (AlertType::River, &feeds.river_url),
        (AlertType::AirQuality, &feeds.air_quality_url),
        (AlertType::Traffic, &feeds.traffic_url),
        (AlertType::Digest, &feeds.digest_url),
    ];

    let mut sources: Vec<Arc<dyn EventSource>> = Vec::new();
    for (alert_type, url) in configured {
        match url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                sources.push(Arc::new(HttpEventSource::new(alert_type, url, timeout)?));
            }
            _ => debug!(%alert_type, "No feed configured"),
        }
    }
    Ok(sources)
}

/// Fixed list of events, for tests and manual runs
#[derive(Debug, Clone)]
pub struct StaticEventSource {
    alert_type: AlertType,
    events: Vec<CandidateEvent>,
}

impl StaticEventSource {
    pub fn new(alert_type: AlertType, events: Vec<CandidateEvent>) -> Self {
        Self { alert_type, events }
    }
}

impl EventSource for StaticEventSource {
    fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    fn fetch(&self) -> BoxFuture<'_, Vec<CandidateEvent>, CivicError> {
        let events = self.events.clone();
        Box::pin(async move { Ok(events) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_parses_and_filters_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/traffic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "sourceId": "511-4411",
                    "title": "I-29 closed",
                    "body": "Crash near exit 147",
                    "kind": {"type": "traffic", "severity": "critical", "road": "I-29"}
                },
                {
                    "sourceId": "nws-1",
                    "title": "Wind Advisory",
                    "body": "",
                    "kind": {"type": "weather", "severity": "Minor", "event": "Wind Advisory", "area": "Plymouth"}
                }
            ])))
            .mount(&server)
            .await;

        let source = HttpEventSource::new(
            AlertType::Traffic,
            format!("{}/traffic", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        let events = source.fetch().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_id, "511-4411");
    }

    #[tokio::test]
    async fn test_river_readings_share_one_id_per_stage_and_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/river"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "sourceId": "usgs-06486000-0800",
                    "title": "Missouri River at Sioux City",
                    "body": "Flood stage reached",
                    "kind": {"type": "river", "siteId": "06486000", "stage": "flood", "gaugeHeightFt": 30.4}
                },
                {
                    "sourceId": "usgs-06486000-0815",
                    "title": "Missouri River at Sioux City",
                    "body": "Flood stage reached",
                    "kind": {"type": "river", "siteId": "06486000", "stage": "flood", "gaugeHeightFt": 30.6}
                }
            ])))
            .mount(&server)
            .await;

        let source = HttpEventSource::new(
            AlertType::River,
            format!("{}/river", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        let events = source.fetch().await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source_id, events[1].source_id);
        assert!(events[0].source_id.starts_with("river:06486000:flood:"));
    }

    #[tokio::test]
    async fn test_feed_outage_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let source =
            HttpEventSource::new(AlertType::River, server.uri(), Duration::from_secs(2)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_only_configured_feeds_become_sources() {
        let feeds = FeedsConfig {
            river_url: Some("http://localhost:9000/river".into()),
            digest_url: Some("  ".into()),
            ..FeedsConfig::default()
        };
        let sources = sources_from_config(&feeds, Duration::from_secs(1)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].alert_type(), AlertType::River);
    }
}
