//! The seam between the orchestrator and the system it migrates from.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiError, ConnectionCheck, CrmClient, Resource};

/// Read access to the source CRM.
///
/// Records come back undecoded so that one malformed record fails on its
/// own during mapping instead of failing the whole page.
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Validate the credential. Never an error.
    async fn test_connection(&self) -> ConnectionCheck;

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError>;

    async fn fetch_jobs(&self) -> Result<Vec<Value>, ApiError>;
}

#[async_trait]
impl CrmSource for CrmClient {
    async fn test_connection(&self) -> ConnectionCheck {
        CrmClient::test_connection(self).await
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_all(Resource::Contacts).await
    }

    async fn fetch_jobs(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_all(Resource::Jobs).await
    }
}
