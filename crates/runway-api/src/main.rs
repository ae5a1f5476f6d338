//! `runway-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP
//! server over an in-memory store.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::Result;

use runway_api::config::Config;
use runway_api::server::Server;
use runway_core::observability::{init_logging, LogFormat};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    if !config.debug && config.worker.base_url.is_none() {
        anyhow::bail!("RUNWAY_WORKER_URL is required when RUNWAY_DEBUG=false");
    }

    init_logging(choose_log_format(&config));

    if config.worker.base_url.is_none() {
        tracing::warn!("RUNWAY_WORKER_URL not set; runs will stay queued (debug only)");
    }

    let server = Server::new(config);
    server.serve().await?;
    Ok(())
}
