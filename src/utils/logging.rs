//! Structured logging setup for the binaries.
//!
//! Library code only emits `tracing` events; subscribers are installed
//! here, by the binaries, never by the library itself.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` when the variable is unset.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
