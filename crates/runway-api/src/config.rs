//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use runway_core::{Error, Result};

/// Configuration for the Runway API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled the server relaxes production guardrails (wildcard CORS
    /// allowed, worker URL optional) and logs pretty instead of JSON.
    pub debug: bool,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// External worker (trainer) configuration.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Subscriber feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8181,
            debug: false,
            cors: CorsConfig::default(),
            worker: WorkerConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

/// CORS configuration for browser-based access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // Default: disabled (secure-by-default).
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// External worker (trainer) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Base URL of the worker's start endpoint (e.g. `http://trainer:8000`).
    ///
    /// When unset, freshly created runs stay `queued` until an operator
    /// delegates them by other means.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bound on the delegation call, in seconds.
    #[serde(default = "default_worker_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_worker_timeout_secs() -> u64 {
    10
}

impl WorkerConfig {
    /// Returns the delegation request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Subscriber feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Interval between tail poll ticks, in milliseconds.
    #[serde(default = "default_feed_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether idle ticks emit a heartbeat message.
    #[serde(default)]
    pub heartbeat: bool,
}

fn default_feed_poll_interval_ms() -> u64 {
    2000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_feed_poll_interval_ms(),
            heartbeat: false,
        }
    }
}

impl FeedConfig {
    /// Returns the poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `RUNWAY_HTTP_PORT`
    /// - `RUNWAY_DEBUG`
    /// - `RUNWAY_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `RUNWAY_CORS_MAX_AGE_SECONDS`
    /// - `RUNWAY_WORKER_URL`
    /// - `RUNWAY_WORKER_TIMEOUT_SECS`
    /// - `RUNWAY_FEED_POLL_INTERVAL_MS`
    /// - `RUNWAY_FEED_HEARTBEAT`
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("RUNWAY_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("RUNWAY_DEBUG")? {
            config.debug = debug;
        }

        if let Some(origins) = env_string("RUNWAY_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_cors_allowed_origins(&origins);
        }
        if let Some(max_age) = env_u64("RUNWAY_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        if let Some(url) = env_string("RUNWAY_WORKER_URL") {
            config.worker.base_url = Some(url);
        }
        if let Some(secs) = env_u64("RUNWAY_WORKER_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "RUNWAY_WORKER_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.worker.request_timeout_secs = secs;
        }

        if let Some(ms) = env_u64("RUNWAY_FEED_POLL_INTERVAL_MS")? {
            if ms == 0 {
                return Err(Error::InvalidInput(
                    "RUNWAY_FEED_POLL_INTERVAL_MS must be greater than 0".to_string(),
                ));
            }
            config.feed.poll_interval_ms = ms;
        }
        if let Some(heartbeat) = env_bool("RUNWAY_FEED_HEARTBEAT")? {
            config.feed.heartbeat = heartbeat;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn parse_cors_allowed_origins(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed == "*" {
        return vec!["*".to_string()];
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
