// File: services/civic_backend/src/main.rs
use axum::Router;
use civic_alerts::{AlertPipeline, Scheduler};
use civic_backend::{app_state::AppState, routes::routes};
use civic_common::logging;
use civic_config::{ensure_dotenv_loaded, load_config};
use civic_db::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be up yet if configuration failed
        eprintln!("Civic alerts backend stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = ensure_dotenv_loaded();
    let config = Arc::new(load_config()?);
    logging::init_with_level(logging::parse_level(config.log_level.as_deref()));
    info!(env_file = %env_file, "Configuration loaded");

    // 1. Database
    let store = Store::connect(&config).await?;
    store.init_schema().await?;

    // 2. Pipeline and scheduled jobs
    let pipeline = Arc::new(AlertPipeline::from_config(store, &config)?);
    let mut scheduler = Scheduler::start(pipeline.clone(), &config.schedule);
    info!(jobs = ?scheduler.jobs(), "Scheduler started");

    // 3. HTTP surface
    let state = AppState::new(config.clone(), pipeline);
    let app = Router::new()
        .nest("/api", routes(state))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
