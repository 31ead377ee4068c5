//! Periodic jobs
//!
//! One task per alert type with a feed, one for receipt reconciliation and
//! one for the retention sweep. A failing run is logged and the job simply
//! runs again on its next tick.

use crate::pipeline::AlertPipeline;
use civic_common::{AlertType, CivicError};
use civic_config::ScheduleConfig;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// How often the cycle of `alert_type` runs
pub fn cadence(schedule: &ScheduleConfig, alert_type: AlertType) -> Duration {
    let secs = match alert_type {
        AlertType::Weather => schedule.weather_secs,
        AlertType::River => schedule.river_secs,
        AlertType::AirQuality => schedule.air_quality_secs,
        AlertType::Traffic => schedule.traffic_secs,
        AlertType::Digest => schedule.digest_secs,
    };
    Duration::from_secs(secs.max(1))
}

fn spawn_periodic<F, Fut, T>(job: &'static str, every: Duration, mut run: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, CivicError>> + Send,
    T: Debug,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match run().await {
                Ok(report) => debug!(job, ?report, "Scheduled job finished"),
                Err(e) => error!(job, "Scheduled job failed: {}", e),
            }
        }
    })
}

/// Running periodic jobs; aborted on [`Scheduler::stop`] or drop
pub struct Scheduler {
    jobs: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn start(pipeline: Arc<AlertPipeline>, schedule: &ScheduleConfig) -> Self {
        let mut jobs = Vec::new();

        for alert_type in pipeline.alert_types() {
            let every = cadence(schedule, alert_type);
            let p = pipeline.clone();
            let handle = spawn_periodic(alert_type.as_str(), every, move || {
                let p = p.clone();
                async move { p.run_alert_type(alert_type).await }
            });
            info!(%alert_type, every_secs = every.as_secs(), "Scheduled matching cycle");
            jobs.push((alert_type.as_str(), handle));
        }

        let p = pipeline.clone();
        let every = Duration::from_secs(schedule.receipts_secs.max(1));
        jobs.push((
            "receipts",
            spawn_periodic("receipts", every, move || {
                let p = p.clone();
                async move { p.reconcile_receipts().await }
            }),
        ));

        let p = pipeline;
        let every = Duration::from_secs(schedule.cleanup_secs.max(1));
        jobs.push((
            "cleanup",
            spawn_periodic("cleanup", every, move || {
                let p = p.clone();
                async move { p.sweep().await }
            }),
        ));

        Self { jobs }
    }

    /// Names of the running jobs
    pub fn jobs(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|(name, _)| *name).collect()
    }

    pub fn stop(&mut self) {
        for (name, handle) in self.jobs.drain(..) {
            handle.abort();
            debug!(job = name, "Scheduled job stopped");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences() {
        let schedule = ScheduleConfig::default();
        assert_eq!(cadence(&schedule, AlertType::Weather), Duration::from_secs(300));
        assert_eq!(cadence(&schedule, AlertType::Traffic), Duration::from_secs(300));
        assert_eq!(cadence(&schedule, AlertType::River), Duration::from_secs(900));
        assert_eq!(cadence(&schedule, AlertType::AirQuality), Duration::from_secs(1800));
        assert_eq!(cadence(&schedule, AlertType::Digest), Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_cadence_is_clamped() {
        let schedule = ScheduleConfig {
            weather_secs: 0,
            ..ScheduleConfig::default()
        };
        assert_eq!(cadence(&schedule, AlertType::Weather), Duration::from_secs(1));
    }
}
