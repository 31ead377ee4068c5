//! HTTP handlers for health checks and manually triggered jobs
//!
//! The cron routes let an external scheduler (or an operator) run a matching
//! cycle, a receipt pass or a retention sweep right now. They answer with the
//! same report the scheduled job would log.

use axum::{
    extract::{Path, State},
    Json,
};
use civic_alerts::{CycleReport, SweepReport};
use civic_common::{not_found, AlertType, CivicError};
use civic_config::AppConfig;
use civic_push::ReconcileReport;
use http::{header::AUTHORIZATION, HeaderMap};
use serde::Serialize;
use tracing::{info, warn};

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database does not answer
    pub status: &'static str,
    pub database: bool,
}

/// Check the `Authorization: Bearer <secret>` header of a cron request.
///
/// Without a configured secret every request is allowed.
pub fn authorize(config: &AppConfig, headers: &HeaderMap) -> Result<(), CivicError> {
    let Some(secret) = config.cron_secret.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == secret => Ok(()),
        _ => {
            warn!("Rejected cron request without a valid bearer secret");
            Err(CivicError::AuthError(
                "missing or invalid cron secret".to_string(),
            ))
        }
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.pipeline.store().client().is_healthy().await;
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}

/// Run one matching cycle for the alert type in the path.
///
/// # Responses
///
/// - 200 OK: the cycle report
/// - 401 Unauthorized: bad or missing cron secret
/// - 404 Not Found: unknown alert type, or no feed configured for it
pub async fn run_alerts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(alert_type): Path<String>,
) -> Result<Json<CycleReport>, CivicError> {
    authorize(&state.config, &headers)?;
    let alert_type: AlertType = alert_type
        .parse()
        .map_err(|_| not_found(format!("unknown alert type: {}", alert_type)))?;

    info!(%alert_type, "Matching cycle triggered over HTTP");
    let report = state.pipeline.run_alert_type(alert_type).await?;
    Ok(Json(report))
}

pub async fn run_receipts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReconcileReport>, CivicError> {
    authorize(&state.config, &headers)?;
    let report = state.pipeline.reconcile_receipts().await?;
    Ok(Json(report))
}

pub async fn run_cleanup_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, CivicError> {
    authorize(&state.config, &headers)?;
    let report = state.pipeline.sweep().await?;
    Ok(Json(report))
}
