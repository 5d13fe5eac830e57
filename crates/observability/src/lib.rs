//! Tracing/logging setup shared by every stockledger binary.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::LogConfig;

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    self::tracing::init(config);
}
