//! Configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::client::retry::{BackoffPolicy, RateLimitPolicy, RetryPolicy};

/// Default source API root.
pub const DEFAULT_BASE_URL: &str = "https://api.external-crm.example/v1";

/// Largest page size the source API accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Read `key`, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_required<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let raw = std::env::var(key).map_err(|_| ConfigError::Missing(key))?;
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Settings for the source API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Records requested per page.
    pub page_size: u32,
    /// Attempts per page request, shared by both retry policies.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Wait used when a 429 response carries no usable `Retry-After`.
    pub rate_limit_default: Duration,
    /// Upper bound on any server-requested wait.
    pub rate_limit_max: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 100,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
            rate_limit_default: Duration::from_secs(5),
            rate_limit_max: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load client settings from the environment.
    ///
    /// | Env Var                       | Default                                |
    /// |-------------------------------|----------------------------------------|
    /// | `CRM_API_BASE_URL`            | `https://api.external-crm.example/v1`  |
    /// | `CRM_PAGE_SIZE`               | `100`                                  |
    /// | `CRM_MAX_ATTEMPTS`            | `3`                                    |
    /// | `CRM_BACKOFF_BASE_MS`         | `500`                                  |
    /// | `CRM_BACKOFF_MAX_MS`          | `10000`                                |
    /// | `CRM_RATE_LIMIT_DEFAULT_SECS` | `5`                                    |
    /// | `CRM_REQUEST_TIMEOUT_SECS`    | `30`                                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let page_size: u32 = env_or("CRM_PAGE_SIZE", defaults.page_size)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                key: "CRM_PAGE_SIZE",
                value: page_size.to_string(),
            });
        }

        let max_attempts: u32 = env_or("CRM_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "CRM_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            base_url: env_or("CRM_API_BASE_URL", defaults.base_url)?,
            page_size,
            max_attempts,
            backoff_base: Duration::from_millis(env_or("CRM_BACKOFF_BASE_MS", 500u64)?),
            backoff_max: Duration::from_millis(env_or("CRM_BACKOFF_MAX_MS", 10_000u64)?),
            rate_limit_default: Duration::from_secs(env_or("CRM_RATE_LIMIT_DEFAULT_SECS", 5u64)?),
            rate_limit_max: defaults.rate_limit_max,
            request_timeout: Duration::from_secs(env_or("CRM_REQUEST_TIMEOUT_SECS", 30u64)?),
        })
    }

    /// Compose the retry policies these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            rate_limit: RateLimitPolicy {
                default_wait: self.rate_limit_default,
                max_wait: self.rate_limit_max,
            },
            backoff: BackoffPolicy {
                base: self.backoff_base,
                max: self.backoff_max,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Runner configuration
// ---------------------------------------------------------------------------

/// Everything the `tradeflow-migrate` binary needs for one run.
#[derive(Clone)]
pub struct RunnerConfig {
    pub database_url: String,
    pub org_id: i64,
    pub user_id: i64,
    pub api_key: String,
    pub dry_run: bool,
    /// Age past which a leftover `running` job is treated as crashed.
    pub stale_after: Duration,
    pub client: ClientConfig,
}

impl std::fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("org_id", &self.org_id)
            .field("user_id", &self.user_id)
            .field("api_key", &"<redacted>")
            .field("dry_run", &self.dry_run)
            .field("stale_after", &self.stale_after)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl RunnerConfig {
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `DATABASE_URL`               | required |
    /// | `MIGRATION_ORG_ID`           | required |
    /// | `MIGRATION_USER_ID`          | required |
    /// | `CRM_API_KEY`                | required |
    /// | `MIGRATION_DRY_RUN`          | `false`  |
    /// | `MIGRATION_STALE_AFTER_SECS` | `3600`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            org_id: env_required("MIGRATION_ORG_ID")?,
            user_id: env_required("MIGRATION_USER_ID")?,
            api_key: env_required("CRM_API_KEY")?,
            dry_run: env_or("MIGRATION_DRY_RUN", false)?,
            stale_after: Duration::from_secs(env_or("MIGRATION_STALE_AFTER_SECS", 3600u64)?),
            client: ClientConfig::from_env()?,
        })
    }
}
