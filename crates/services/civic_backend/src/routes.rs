use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::{
    health_handler, run_alerts_handler, run_cleanup_handler, run_receipts_handler,
};

/// Routes of the service, to be nested under `/api`
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/cron/alerts/{alert_type}", post(run_alerts_handler))
        .route("/cron/receipts", post(run_receipts_handler))
        .route("/cron/cleanup", post(run_cleanup_handler))
        .with_state(state)
}
