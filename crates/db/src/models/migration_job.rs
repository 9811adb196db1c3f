//! Migration job models: one row per orchestrator invocation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `migration_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MigrationJob {
    pub id: DbId,
    pub org_id: DbId,
    pub user_id: DbId,
    pub source: String,
    /// One of `running`, `completed`, `failed`.
    pub status: String,
    pub dry_run: bool,
    /// Serialized `MigrationStats`.
    pub stats: serde_json::Value,
    pub imported_count: i32,
    pub skipped_count: i32,
    pub error_count: i32,
    pub errors: Vec<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for opening a migration job in `running` status.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMigrationJob {
    pub org_id: DbId,
    pub user_id: DbId,
    pub source: String,
    pub dry_run: bool,
}

/// Terminal state written when a run ends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FinalizeMigrationJob {
    /// `completed` or `failed`.
    pub status: String,
    pub stats: serde_json::Value,
    pub imported_count: i32,
    pub skipped_count: i32,
    pub error_count: i32,
    pub errors: Vec<String>,
}
