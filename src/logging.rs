//! Logging configuration.
//!
//! Diagnostics go to stderr so stdout carries only help and version text.
//! Set `LARGETYPE_LOG` to an `EnvFilter` directive (e.g. `debug` or
//! `largetype_overlay=trace`) to raise verbosity.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_ENV: &str = "LARGETYPE_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Call once, before anything logs.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .init();

    tracing::debug!("largetype logging initialized");
}
