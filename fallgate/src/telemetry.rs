//! Tracing initialization.
//!
//! Sets up a tracing-subscriber registry with an environment-driven filter
//! and console output. Use `RUST_LOG` to adjust verbosity, e.g.
//! `RUST_LOG=fallgate=debug,tower_http=debug`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging for the process.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
