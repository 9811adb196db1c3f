//! Retry policies for source API page requests.
//!
//! Two independent policies decide how long to wait before the next
//! attempt: [`RateLimitPolicy`] honours the wait the server asked for on
//! HTTP 429, and [`BackoffPolicy`] applies capped exponential backoff to
//! transient failures. [`RetryPolicy`] composes them and owns the attempt
//! budget both draw from.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use super::ApiError;

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Why a single page request attempt failed.
#[derive(Debug)]
pub enum FetchFailure {
    /// HTTP 429. `retry_after` is the server's hint, when it sent a usable one.
    RateLimited { retry_after: Option<Duration> },
    /// Any other failure.
    Failed(ApiError),
}

impl FetchFailure {
    /// Convert into the error surfaced once the budget is spent.
    pub fn into_error(self, attempts: u32) -> ApiError {
        match self {
            Self::RateLimited { .. } => ApiError::RateLimited { attempts },
            Self::Failed(err) => err,
        }
    }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    // Rejects NaN, negatives and values too large for a Duration.
    Duration::try_from_secs_f64(secs).ok()
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Waits as long as the server asks, bounded by `max_wait`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub default_wait: Duration,
    pub max_wait: Duration,
}

impl RateLimitPolicy {
    pub fn wait(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.default_wait).min(self.max_wait)
    }
}

/// Capped exponential backoff: `min(base * 2^(attempt - 1), max)`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay after the `attempt`-th (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Both policies plus the attempt budget they share.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub rate_limit: RateLimitPolicy,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// How long to wait before retrying after the `attempt`-th (1-based)
    /// attempt failed, or `None` to give up.
    pub fn next_delay(&self, attempt: u32, failure: &FetchFailure) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        match failure {
            FetchFailure::RateLimited { retry_after } => Some(self.rate_limit.wait(*retry_after)),
            FetchFailure::Failed(err) if err.is_transient() => Some(self.backoff.delay(attempt)),
            FetchFailure::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
