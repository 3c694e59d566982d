//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing, JSON unless `HAULX_LOG_FORMAT` says
/// otherwise.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_from_env();
}

/// Tracing configuration (filters, formats).
pub mod tracing;
