//! # libprobe API
//!
//! Hosting probe service for the library-management backend: fault
//! injection, slow and cancellable requests, health checks and runtime
//! switching between the old and new databases.

mod config;
mod handlers;
mod routes;

use anyhow::Context;
use config::Settings;
use handlers::AppContext;
use libprobe_core::SqlxConnector;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// JSON logs; `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (settings, notices) = Settings::from_env().context("failed to load settings")?;
    init_tracing(&settings.logging.level);
    for notice in &notices {
        notice.log();
    }

    info!(
        version = %settings.api_info.version,
        address = %settings.server.address,
        database = %settings.default_database,
        "Starting libprobe API"
    );

    let ctx = AppContext::new(settings, Arc::new(SqlxConnector::new()));
    let server = routes::build_server(&ctx).context("failed to register routes")?;
    server.serve().await.context("server terminated with an error")?;

    info!("libprobe API stopped");
    Ok(())
}
