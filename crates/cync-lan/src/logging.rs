//! Structured logging init (spec.md §1 "logging format ... the core
//! consumes a typed config struct and emits structured events", §6
//! `log.format`).
//!
//! The teacher always initializes `tracing_subscriber::fmt()` with a JSON
//! formatter (`zc_fleet_agent::main`, `zc_cloud_api::main`); this
//! generalizes that one-shape init into a small selector over
//! `LogFormat::{Json,Human,Both}`, still built on `tracing`/
//! `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "info" })
    })
}

/// Initialize the global `tracing` subscriber per `config.format`. `Both`
/// logs human-readable lines to stdout and a parallel JSON stream to
/// stderr, for a human operator and a log shipper at once.
pub fn init(config: &LogConfig) {
    match config.format {
        crate::config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(config.debug))
                .json()
                .init();
        }
        crate::config::LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(config.debug))
                .init();
        }
        crate::config::LogFormat::Both => {
            use tracing_subscriber::prelude::*;

            let human = tracing_subscriber::fmt::layer();
            let json = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr);

            tracing_subscriber::registry()
                .with(env_filter(config.debug))
                .with(human)
                .with(json)
                .init();
        }
    }
}

/// Emit a `slow` event when `elapsed` exceeds the configured threshold
/// (spec.md §6 `perf.threshold_ms`). Called by the command pipeline after
/// every dispatch and by the frame decoder's per-packet hot path.
pub fn log_if_slow(operation: &'static str, elapsed: std::time::Duration, threshold_ms: u64) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed_ms > threshold_ms {
        tracing::warn!(operation, elapsed_ms, threshold_ms, "slow");
    }
}
