//! Tracing and logging setup shared by the billing crates.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
/// An invalid `RENTBILL_LOG_FORMAT` falls back to JSON output.
pub fn init() {
    let config = tracing::ObservabilityConfig::from_env().unwrap_or_default();
    tracing::init_with(&config);
}

/// Install a subscriber that writes through the test harness's capture.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, ObservabilityConfig};
