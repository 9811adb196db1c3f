//! REST client for the source CRM.
//!
//! Fetches one page or every page of a list resource with bearer-token
//! authentication. Each page request runs under a [`RetryPolicy`]: HTTP 429
//! waits as long as the server asks, transient failures back off
//! exponentially, and both draw from the same attempt budget.

pub mod retry;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ClientConfig;
use retry::{parse_retry_after, FetchFailure, RetryPolicy};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the source API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The source returned a non-2xx, non-429 status code.
    #[error("Source API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Still rate limited after the whole attempt budget.
    #[error("Source API rate limit not lifted after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The body was not a valid page envelope.
    #[error("Malformed page response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, 408 and 5xx are transient. Other 4xx
    /// responses (bad credential, unknown resource) are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(err) => !err.is_builder(),
            Self::Status { status, .. } => *status == 408 || *status >= 500,
            Self::RateLimited { .. } => true,
            Self::Decode(_) | Self::InvalidBaseUrl(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A list resource exposed by the source API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Contacts,
    Jobs,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Jobs => "jobs",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Envelope returned by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub has_more: bool,
}

/// Result of a credential check. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCheck {
    pub ok: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated HTTP client for one source CRM account.
pub struct CrmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl CrmClient {
    /// Build a client for `config.base_url`, authenticating with `api_key`.
    pub fn new(config: &ClientConfig, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|_| ApiError::InvalidBaseUrl(config.base_url.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            page_size: config.page_size,
            retry: config.retry_policy(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of `resource`, retrying under the client's policy.
    #[tracing::instrument(level = "debug", skip(self, resource), fields(resource = %resource))]
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: Resource,
        page: u32,
        page_size: u32,
    ) -> Result<Page<T>, ApiError> {
        let url = format!("{}/{}", self.base_url, resource.path());
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match self.try_fetch(&url, page, page_size).await {
                Ok(page) => return Ok(page),
                Err(failure) => failure,
            };

            let Some(delay) = self.retry.next_delay(attempt, &failure) else {
                let err = failure.into_error(attempt);
                tracing::error!(attempt, error = %err, "Page request failed, giving up");
                return Err(err);
            };

            match &failure {
                FetchFailure::RateLimited { .. } => tracing::warn!(
                    attempt,
                    wait_ms = delay.as_millis() as u64,
                    "Rate limited by source API, waiting"
                ),
                FetchFailure::Failed(err) => tracing::warn!(
                    attempt,
                    wait_ms = delay.as_millis() as u64,
                    error = %err,
                    "Page request failed, retrying"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Drain every page of `resource` in order.
    ///
    /// Stops when the server reports no further pages, or when a page comes
    /// back empty regardless of what `hasMore` says.
    #[tracing::instrument(level = "info", skip(self, resource), fields(resource = %resource))]
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, ApiError> {
        let mut records = Vec::new();
        let mut page_number = 1;

        loop {
            let page: Page<T> = self.fetch_page(resource, page_number, self.page_size).await?;
            let fetched = page.data.len();
            records.extend(page.data);

            tracing::debug!(
                page = page_number,
                fetched,
                total_count = page.total_count,
                has_more = page.has_more,
                "Fetched page"
            );

            if !page.has_more || fetched == 0 {
                break;
            }
            page_number += 1;
        }

        tracing::info!(count = records.len(), "Fetched all records");
        Ok(records)
    }

    /// Validate the credential with a single one-record request.
    pub async fn test_connection(&self) -> ConnectionCheck {
        match self
            .fetch_page::<serde_json::Value>(Resource::Contacts, 1, 1)
            .await
        {
            Ok(_) => ConnectionCheck {
                ok: true,
                error: None,
            },
            Err(err) => ConnectionCheck {
                ok: false,
                error: Some(err.to_string()),
            },
        }
    }

    // ---- private helpers ----

    /// Single attempt: send, classify the status, decode the envelope.
    async fn try_fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<T>, FetchFailure> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await
            .map_err(|e| FetchFailure::Failed(e.into()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchFailure::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::Failed(e.into()))?;

        if !status.is_success() {
            return Err(FetchFailure::Failed(ApiError::Status {
                status: status.as_u16(),
                body,
            }));
        }

        serde_json::from_str(&body).map_err(|e| FetchFailure::Failed(e.into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths() {
        assert_eq!(Resource::Contacts.path(), "contacts");
        assert_eq!(format!("{}", Resource::Jobs), "jobs");
    }

    #[test]
    fn page_envelope_decodes_camel_case() {
        let page: Page<serde_json::Value> = serde_json::from_str(
            r#"{"data":[{"id":"1"}],"totalCount":41,"page":1,"pageSize":1,"hasMore":true}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.total_count, 41);
        assert!(page.has_more);
    }

    #[test]
    fn missing_has_more_means_last_page() {
        let page: Page<serde_json::Value> =
            serde_json::from_str(r#"{"data":[],"page":3,"pageSize":50}"#).unwrap();
        assert!(!page.has_more);
    }

    #[test]
    fn invalid_base_url_rejected() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        let err = CrmClient::new(&config, "key").err().unwrap();
        assert!(matches!(err, ApiError::InvalidBaseUrl(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = ClientConfig {
            base_url: "https://crm.example.com/api/".to_string(),
            ..ClientConfig::default()
        };
        let client = CrmClient::new(&config, "key").unwrap();
        assert_eq!(client.base_url(), "https://crm.example.com/api");
    }

    #[test]
    fn transient_classification() {
        let status = |s| ApiError::Status {
            status: s,
            body: String::new(),
        };
        assert!(status(500).is_transient());
        assert!(status(408).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
        assert!(!ApiError::InvalidBaseUrl("x".into()).is_transient());
    }

    #[test]
    fn api_error_display() {
        let err = ApiError::Status {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "Source API error (403): forbidden");
    }
}
