use tradeflow_core::types::DbId;

use crate::mapper::MappingError;
use crate::store::StoreError;

/// Errors returned by the migration entry point.
///
/// Only raised when no Migration Job row could be opened. Once a job exists,
/// every failure is recorded on it and reported through `MigrationResult`.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Invalid migration request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("A migration is already running for organization {org_id}")]
    AlreadyRunning { org_id: DbId },

    #[error("Could not open migration job: {0}")]
    Store(#[from] StoreError),
}

/// Why one record, or one sub-step of a job record, was not migrated.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dependency unresolved: {0}")]
    DependencyUnresolved(String),
}
