//! Work order (execution record) entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `work_orders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkOrder {
    pub id: DbId,
    pub org_id: DbId,
    pub contact_id: DbId,
    pub property_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub work_type: String,
    pub estimated_value_cents: Option<i64>,
    pub external_source: Option<String>,
    pub external_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a work order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateWorkOrder {
    pub org_id: DbId,
    pub contact_id: DbId,
    pub property_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub work_type: String,
    pub estimated_value_cents: Option<i64>,
    pub external_source: String,
    pub external_id: String,
}
