//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Filtering is configured via `RUST_LOG`; output is JSON unless
/// `LOG_FORMAT=compact` is set (useful for local development).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let compact = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "compact");
    let _ = if compact {
        builder.compact().try_init()
    } else {
        builder.json().try_init()
    };
}
