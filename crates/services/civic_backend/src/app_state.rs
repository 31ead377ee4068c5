// --- File: crates/services/civic_backend/src/app_state.rs ---
use std::sync::Arc;

use civic_alerts::AlertPipeline;
use civic_config::AppConfig;

/// Application state shared across all routes.
///
/// The scheduler and the cron routes drive the same [`AlertPipeline`], so a
/// manually triggered cycle goes through the same ledger as a scheduled one.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<AlertPipeline>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pipeline: Arc<AlertPipeline>) -> Self {
        Self { config, pipeline }
    }
}
