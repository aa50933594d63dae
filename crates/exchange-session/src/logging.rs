//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,exchange=debug";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages everywhere
/// - `RUST_LOG=exchange_core=trace` - Trace the engine only
/// - Default: `info`, with `debug` for the exchange crates
///
/// Calling it twice is harmless; the second call keeps the first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
