//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber for the process.
///
/// Respects the `RUST_LOG` environment variable. Safe to call more than once;
/// subsequent calls are no-ops.
///
/// # Errors
///
/// Returns error if subscriber initialization fails for a reason other than
/// an already-installed global subscriber.
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_filter(EnvFilter::from_default_env());

    match tracing_subscriber::registry().with(fmt_layer).try_init() {
        Ok(()) => Ok(()),
        // A subscriber installed by the host application wins.
        Err(_) => Ok(()),
    }
}
