// --- File: crates/civic_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g., sqlite://data/civic.db, loaded via CIVIC__DATABASE__URL
    #[serde(default)]
    pub max_connections: Option<u32>,
}

// --- Push Provider Config ---
// Holds non-secret push settings. The access token may be "secret_from_env" (PUSH_ACCESS_TOKEN).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    #[serde(default = "default_push_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Maximum number of messages per send request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum number of receipt ids per receipt lookup.
    #[serde(default = "default_receipt_batch_size")]
    pub receipt_batch_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Receipts younger than this are not queried yet.
    #[serde(default = "default_receipt_grace_minutes")]
    pub receipt_grace_minutes: i64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_url: default_push_api_url(),
            access_token: None,
            batch_size: default_batch_size(),
            receipt_batch_size: default_receipt_batch_size(),
            request_timeout_secs: default_request_timeout_secs(),
            receipt_grace_minutes: default_receipt_grace_minutes(),
        }
    }
}

fn default_push_api_url() -> String {
    "https://exp.host/--/api/v2".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_receipt_batch_size() -> usize {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_receipt_grace_minutes() -> i64 {
    15
}

// --- Upstream Feed Config ---
// Each URL points at a feed adapter returning candidate events as JSON.
// An alert type without a URL is not scheduled.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FeedsConfig {
    pub weather_url: Option<String>,
    pub river_url: Option<String>,
    pub air_quality_url: Option<String>,
    pub traffic_url: Option<String>,
    pub digest_url: Option<String>,
}

// --- Schedule Config (all intervals in seconds) ---
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub weather_secs: u64,
    pub river_secs: u64,
    pub air_quality_secs: u64,
    pub traffic_secs: u64,
    pub digest_secs: u64,
    pub receipts_secs: u64,
    pub cleanup_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weather_secs: 5 * 60,
            river_secs: 15 * 60,
            air_quality_secs: 30 * 60,
            traffic_secs: 5 * 60,
            digest_secs: 60 * 60,
            receipts_secs: 15 * 60,
            cleanup_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: 7 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    /// Recipients processed concurrently within one cycle.
    pub concurrency: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { concurrency: 16 }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub matching: MatchingConfig,

    // --- Runtime settings ---
    #[serde(default)]
    pub log_level: Option<String>,
    /// Bearer secret for the cron routes. "secret_from_env" reads CRON_SECRET.
    #[serde(default)]
    pub cron_secret: Option<String>,
}
