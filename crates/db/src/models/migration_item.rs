//! Audit ledger rows: one per processing attempt of one external record.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `migration_items` table. Rows are never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MigrationItem {
    pub id: DbId,
    pub migration_id: DbId,
    pub entity_type: String,
    pub external_id: String,
    /// One of `imported`, `skipped`, `error`.
    pub status: String,
    pub internal_id: Option<DbId>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending a ledger row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateMigrationItem {
    pub migration_id: DbId,
    pub entity_type: String,
    pub external_id: String,
    pub status: String,
    pub internal_id: Option<DbId>,
    pub error_message: Option<String>,
}
