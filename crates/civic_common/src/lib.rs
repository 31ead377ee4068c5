// --- File: crates/civic_common/src/lib.rs ---

//! Shared building blocks of the civic alerts pipeline: the domain model,
//! the error taxonomy, logging setup and the traits behind which the external
//! collaborators (push provider, upstream feeds) sit.

pub mod alert_config; // Per-type subscription configuration
pub mod error; // Error handling
pub mod events; // Candidate events from upstream feeds
pub mod http; // HTTP response mapping
pub mod logging; // Logging utilities
pub mod models; // Identities, alert types, push targets
pub mod services; // Push provider and event source abstractions

pub use alert_config::{AirQualityConfig, AlertConfig, RiverConfig, TrafficConfig, WeatherConfig};
pub use error::{
    config_error, external_service_error, not_found, validation_error, CivicError, HttpStatusCode,
};
pub use events::{CandidateEvent, EventKind, RiverStage, TrafficSeverity, WeatherSeverity};
pub use models::{
    AlertType, DevicePreferences, DeviceRegistration, Identity, Platform, PushPayload, PushTarget,
};
pub use services::{
    BoxFuture, EventSource, PushErrorCode, PushMessage, PushProvider, PushTicket, ReceiptStatus,
};
