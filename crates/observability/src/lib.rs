//! Tracing/logging setup shared by hosts and tests.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide observability (JSON logs).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Human-readable logs captured by the test harness.
///
/// Safe to call from every test.
pub fn init_for_tests() {
    tracing::init_for_tests();
}
