//! Logging - env-filtered tracing, JSON output for log shippers.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. `RUST_LOG` controls the filter
/// (default `info`); `BTCWALLET_LOG_JSON=1` switches to JSON lines.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = matches!(std::env::var("BTCWALLET_LOG_JSON").as_deref(), Ok("1"));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
}
