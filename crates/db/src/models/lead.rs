//! Lead (sales pipeline) entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `leads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lead {
    pub id: DbId,
    pub org_id: DbId,
    pub contact_id: DbId,
    pub property_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    pub stage: String,
    pub temperature: String,
    /// Estimated deal value in cents. `None` when the source had no amount.
    pub estimated_value_cents: Option<i64>,
    pub external_source: Option<String>,
    pub external_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a lead.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateLead {
    pub org_id: DbId,
    pub contact_id: DbId,
    pub property_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    pub stage: String,
    pub temperature: String,
    pub estimated_value_cents: Option<i64>,
    pub external_source: String,
    pub external_id: String,
}
