//! Alert matching and delivery orchestration
//!
//! This crate ties the pieces together: candidate events from upstream feeds
//! are matched against subscriptions, deduplicated through the ledger and
//! handed to the push dispatcher. It also owns retention sweeping and the
//! periodic scheduler.

pub mod cycle;
pub mod matcher;
pub mod pipeline;
pub mod recipients;
pub mod scheduler;
pub mod source;
pub mod source_id;
pub mod sweeper;

pub use cycle::{CycleReport, MatchingCycle};
pub use matcher::matches;
pub use pipeline::AlertPipeline;
pub use recipients::{load_recipients, Recipient};
pub use scheduler::Scheduler;
pub use source::{sources_from_config, HttpEventSource, StaticEventSource};
pub use source_id::{air_quality_source_id, normalize_source_id, river_source_id};
pub use sweeper::{RetentionSweeper, SweepReport};
