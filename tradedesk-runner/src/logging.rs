//! Tracing subscriber setup for binaries and integration harnesses.
//!
//! The core crate only emits events; installing a subscriber is left to
//! whoever drives the simulation.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    /// One line per event, no span context.
    Compact,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
