//! Limit/offset helpers for run-history and ledger drill-down queries.

/// Default page size for migration job listings.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Maximum page size for migration job listings.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Default page size for ledger drill-down.
pub const DEFAULT_LEDGER_LIMIT: i64 = 100;

/// Maximum page size for ledger drill-down.
pub const MAX_LEDGER_LIMIT: i64 = 1000;

/// Clamp a caller-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a caller-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
