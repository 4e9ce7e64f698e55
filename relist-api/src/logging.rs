//! Structured logging
//!
//! Initializes the `tracing` subscriber with environment-based filtering
//! via `RUST_LOG`. Call exactly once, early in `main()`.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `default_level` applies when `RUST_LOG` is not set, e.g.
/// `"relist_api=info,escrow_engine=info"`.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
