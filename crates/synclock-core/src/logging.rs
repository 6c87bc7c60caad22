#![forbid(unsafe_code)]

//! Structured logging helpers.
//!
//! The runtime emits `tracing` events unconditionally; installing a
//! subscriber is up to the embedding process. With the `tracing-json` feature
//! this module provides a ready-made JSON subscriber filtered by
//! `SYNCLOCK_LOG` (standard `EnvFilter` directives, default `info`).

pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "SYNCLOCK_LOG";

/// Install a global JSON subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
