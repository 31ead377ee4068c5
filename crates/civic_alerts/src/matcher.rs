//! Subscription config against candidate event.

use civic_common::{AlertConfig, CandidateEvent, EventKind};

/// Whether `event` is something the holder of `config` wants to hear about.
///
/// Pure. Empty lists in the config mean "use the defaults", and a config of
/// another alert type never matches.
pub fn matches(config: &AlertConfig, event: &CandidateEvent) -> bool {
    match (config, &event.kind) {
        (AlertConfig::Weather(c), EventKind::Weather { severity, .. }) => {
            c.effective_severities().contains(severity)
        }
        (AlertConfig::River(c), EventKind::River { site_id, stage, .. }) => {
            c.watches_site(site_id) && c.effective_stages().contains(stage)
        }
        (AlertConfig::AirQuality(c), EventKind::AirQuality { aqi, .. }) => {
            *aqi >= c.effective_min_aqi()
        }
        (AlertConfig::Traffic(c), EventKind::Traffic { severity, .. }) => {
            c.effective_severities().contains(severity)
        }
        (AlertConfig::Digest, EventKind::Digest { .. }) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_common::{AlertType, RiverStage, TrafficSeverity, WeatherSeverity};

    fn weather(severity: WeatherSeverity) -> CandidateEvent {
        CandidateEvent::new(
            "nws-1",
            "Severe Thunderstorm Warning",
            "Until 9 PM",
            EventKind::Weather {
                severity,
                event: Some("Severe Thunderstorm Warning".into()),
                area: Some("Woodbury County".into()),
            },
        )
    }

    fn river(site_id: &str, stage: RiverStage) -> CandidateEvent {
        CandidateEvent::new(
            format!("river:{}:{}", site_id, stage.as_str()),
            "River stage",
            "",
            EventKind::River {
                site_id: site_id.into(),
                site_name: Some("Missouri River at Sioux City".into()),
                stage,
                gauge_height_ft: Some(31.2),
            },
        )
    }

    fn air(aqi: u32) -> CandidateEvent {
        CandidateEvent::new(
            format!("aqi:{}", aqi),
            "Air quality",
            "",
            EventKind::AirQuality {
                aqi,
                location: Some("Sioux City".into()),
            },
        )
    }

    #[test]
    fn test_empty_weather_config_equals_explicit_defaults() {
        let empty = AlertConfig::parse_strict(AlertType::Weather, "{}").unwrap();
        let explicit = AlertConfig::parse_strict(
            AlertType::Weather,
            r#"{"severities":["Moderate","Severe","Extreme"]}"#,
        )
        .unwrap();

        for config in [&empty, &explicit] {
            assert!(!matches(config, &weather(WeatherSeverity::Minor)));
            assert!(matches(config, &weather(WeatherSeverity::Severe)));
        }
    }

    #[test]
    fn test_aqi_threshold_boundary() {
        let config = AlertConfig::parse_strict(AlertType::AirQuality, r#"{"minAqi":101}"#).unwrap();
        assert!(matches(&config, &air(101)));
        assert!(matches(&config, &air(200)));
        assert!(!matches(&config, &air(100)));

        let default = AlertConfig::default_for(AlertType::AirQuality);
        assert!(matches(&default, &air(101)));
        assert!(!matches(&default, &air(100)));
    }

    #[test]
    fn test_river_site_and_stage() {
        let config = AlertConfig::parse_strict(
            AlertType::River,
            r#"{"siteIds":["06486000"],"stages":["action","flood"]}"#,
        )
        .unwrap();

        assert!(matches(&config, &river("06486000", RiverStage::Flood)));
        assert!(!matches(&config, &river("06486000", RiverStage::Normal)));
        assert!(!matches(&config, &river("06610000", RiverStage::Flood)));

        let any_site = AlertConfig::default_for(AlertType::River);
        assert!(matches(&any_site, &river("06610000", RiverStage::Action)));
        assert!(!matches(&any_site, &river("06610000", RiverStage::Major)));
    }

    #[test]
    fn test_traffic_defaults() {
        let event = |severity| {
            CandidateEvent::new(
                "511-1",
                "Crash",
                "",
                EventKind::Traffic {
                    severity,
                    road: Some("I-29".into()),
                },
            )
        };
        let config = AlertConfig::default_for(AlertType::Traffic);
        assert!(matches(&config, &event(TrafficSeverity::Critical)));
        assert!(!matches(&config, &event(TrafficSeverity::Moderate)));
    }

    #[test]
    fn test_mismatched_kinds_never_match() {
        let config = AlertConfig::default_for(AlertType::Weather);
        assert!(!matches(&config, &air(400)));
        assert!(!matches(&AlertConfig::Digest, &weather(WeatherSeverity::Extreme)));
    }

    #[test]
    fn test_digest_always_matches_its_kind() {
        let edition = CandidateEvent::new(
            "digest-2026-10-18",
            "Today in Sioux City",
            "",
            EventKind::Digest {
                edition: Some("2026-10-18".into()),
            },
        );
        assert!(matches(&AlertConfig::Digest, &edition));
    }
}
