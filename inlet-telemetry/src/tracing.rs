use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Default filter directive applied when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVE: &str = "info";

/// Initializes the global tracing subscriber for the process.
///
/// The filter is taken from `RUST_LOG` when present and falls back to `info`.
/// Fails if a global subscriber was already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish()
        .try_init()
}

/// Initializes tracing for tests, ignoring repeated initialization.
///
/// Tests across a binary share the global subscriber, so every test can call
/// this without coordinating which one runs first.
pub fn init_test_tracing() {
    let _ = init_tracing();
}
