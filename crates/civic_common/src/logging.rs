//! Logging utilities for the civic alerts pipeline.
//!
//! Every crate logs through `tracing`; this module installs the subscriber
//! once at process start.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` is honoured; the given level is added as a directive for the
/// `civic` crates. Calling this more than once is harmless.
///
/// # Examples
///
/// ```
/// use civic_common::logging;
///
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init_with_level(level: Level) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("civic={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // try_init: a global subscriber may already be set (tests, embedding)
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Parse a configured level name, falling back to INFO.
pub fn parse_level(name: Option<&str>) -> Level {
    name.and_then(|n| n.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}
