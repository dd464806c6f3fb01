//! # bleunlock-server
//!
//! HTTP server for bleunlock.
//!
//! This binary provides:
//! - Device identity resolution over the OS Bluetooth catalogs
//! - Recording and lookup of lock/unlock events
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package bleunlock-server
//!
//! # With an explicit config file
//! BLEUNLOCK_CONFIG=./config.toml ./bleunlock-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use bleunlock_core::{create_log_store, default_config_path, Config};
use bleunlock_server::{api, logging, state::AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var_os("BLEUNLOCK_CONFIG").map_or_else(default_config_path, PathBuf::from);
    let config = Config::load_or_default(&config_path)?;

    logging::init(&config.logging)?;

    info!(config = %config_path.display(), "Starting bleunlock-server");

    if config.event_log.create_if_missing {
        create_log_store(&config.event_log.path)?;
    }

    let addr = config.server.bind_addr()?;
    let state = AppState::from_config(config)?.shared();

    // Open the log up front so the first unlock is not delayed by it.
    if !state.event_log.prepare() {
        warn!(
            path = %state.event_log.path().display(),
            "Event log unavailable, events will not be recorded"
        );
    }

    let app = api::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
