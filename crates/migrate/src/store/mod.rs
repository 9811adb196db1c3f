//! Persistence seam for the orchestrator.
//!
//! [`MigrationStore`] is everything a run writes or looks up. The Postgres
//! implementation wraps the `tradeflow-db` repositories; the in-memory one
//! backs orchestrator tests and enforces the same uniqueness and foreign key
//! rules.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use tradeflow_core::migration::EntityType;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::contact::CreateContact;
use tradeflow_db::models::lead::CreateLead;
use tradeflow_db::models::migration_item::CreateMigrationItem;
use tradeflow_db::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob, MigrationJob};
use tradeflow_db::models::property::CreateProperty;
use tradeflow_db::models::work_order::CreateWorkOrder;

pub use memory::InMemoryStore;
pub use postgres::PgMigrationStore;

/// Constraint guarding one `running` job per organization.
pub const RUNNING_JOB_CONSTRAINT: &str = "uq_migration_jobs_running_org";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Referenced {entity} {id} does not exist")]
    MissingDependency { entity: &'static str, id: DbId },

    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("Conflict on {0}")]
    Conflict(String),
}

/// The de-duplication key shared by every migrated entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey<'a> {
    pub org_id: DbId,
    pub external_source: &'a str,
    pub external_id: &'a str,
}

impl<'a> DedupKey<'a> {
    pub fn new(org_id: DbId, external_source: &'a str, external_id: &'a str) -> Self {
        Self {
            org_id,
            external_source,
            external_id,
        }
    }
}

/// Result of a conflict-safe insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the row.
    Inserted(DbId),
    /// A row with the same dedup key already existed, possibly written by a
    /// concurrent run between our lookup and our insert.
    Existing(DbId),
}

impl InsertOutcome {
    pub fn id(&self) -> DbId {
        match self {
            Self::Inserted(id) | Self::Existing(id) => *id,
        }
    }
}

#[async_trait]
pub trait MigrationStore: Send + Sync {
    // -- migration jobs --

    /// Open a job in `running` status. Fails with
    /// [`StoreError::Conflict`] naming [`RUNNING_JOB_CONSTRAINT`] when the
    /// organization already has a running job.
    async fn create_job(&self, input: &CreateMigrationJob) -> Result<MigrationJob, StoreError>;

    /// Fail the organization's `running` jobs started at or before
    /// `started_before`, recording `reason`. Returns how many were failed.
    async fn abandon_stale_jobs(
        &self,
        org_id: DbId,
        started_before: Timestamp,
        reason: &str,
    ) -> Result<u64, StoreError>;

    /// Move a running job to its terminal status.
    async fn finalize_job(&self, id: DbId, input: &FinalizeMigrationJob)
        -> Result<(), StoreError>;

    // -- ledger --

    async fn append_item(&self, input: &CreateMigrationItem) -> Result<(), StoreError>;

    // -- migrated entities --

    /// Id of the already-migrated record of `entity` with this key.
    async fn find_existing(
        &self,
        entity: EntityType,
        key: &DedupKey<'_>,
    ) -> Result<Option<DbId>, StoreError>;

    async fn insert_contact(&self, input: &CreateContact) -> Result<InsertOutcome, StoreError>;

    async fn insert_property(&self, input: &CreateProperty)
        -> Result<InsertOutcome, StoreError>;

    async fn insert_lead(&self, input: &CreateLead) -> Result<InsertOutcome, StoreError>;

    async fn insert_work_order(
        &self,
        input: &CreateWorkOrder,
    ) -> Result<InsertOutcome, StoreError>;
}
