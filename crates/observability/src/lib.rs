//! Process-wide logging setup for accrual jobs.

/// Initialize structured logging with the default `info` filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Subscriber configuration (filters, formatter).
pub mod tracing;
