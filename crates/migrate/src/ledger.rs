//! Writes the per-record audit trail of one run and keeps its counters.

use tradeflow_core::migration::{EntityType, ItemStatus, MigrationStats};
use tradeflow_core::types::DbId;
use tradeflow_db::models::migration_item::CreateMigrationItem;

use crate::error::RecordError;
use crate::store::{InsertOutcome, MigrationStore};

/// What happened to one record that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Imported(DbId),
    /// Already migrated, by an earlier run or a concurrent writer.
    Skipped(DbId),
}

impl Resolution {
    pub fn id(&self) -> DbId {
        match self {
            Self::Imported(id) | Self::Skipped(id) => *id,
        }
    }
}

impl From<InsertOutcome> for Resolution {
    fn from(outcome: InsertOutcome) -> Self {
        match outcome {
            InsertOutcome::Inserted(id) => Self::Imported(id),
            InsertOutcome::Existing(id) => Self::Skipped(id),
        }
    }
}

/// Ledger writer for a single migration run.
///
/// Every call appends exactly one `migration_items` row and bumps exactly
/// one counter. A failed append is logged and reported as a run error but
/// the counter still moves, so the returned stats describe what was
/// attempted.
pub struct Ledger<'a, S: MigrationStore + ?Sized> {
    store: &'a S,
    migration_id: DbId,
    stats: MigrationStats,
    errors: Vec<String>,
}

impl<'a, S: MigrationStore + ?Sized> Ledger<'a, S> {
    pub fn new(store: &'a S, migration_id: DbId) -> Self {
        Self {
            store,
            migration_id,
            stats: MigrationStats::default(),
            errors: Vec::new(),
        }
    }

    pub fn migration_id(&self) -> DbId {
        self.migration_id
    }

    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_parts(self) -> (MigrationStats, Vec<String>) {
        (self.stats, self.errors)
    }

    /// Record the outcome of one record's processing.
    pub async fn record(
        &mut self,
        entity: EntityType,
        external_id: &str,
        outcome: Result<Resolution, RecordError>,
    ) {
        match outcome {
            Ok(Resolution::Imported(id)) => {
                tracing::debug!(entity_type = %entity, external_id, internal_id = id, "Imported");
                self.append(entity, external_id, ItemStatus::Imported, Some(id), None)
                    .await;
            }
            Ok(Resolution::Skipped(id)) => {
                tracing::debug!(entity_type = %entity, external_id, internal_id = id, "Already migrated");
                self.append(entity, external_id, ItemStatus::Skipped, Some(id), None)
                    .await;
            }
            Err(err) => self.failed(entity, external_id, &err.to_string()).await,
        }
    }

    /// Record a failed record with a human-readable reason.
    pub async fn failed(&mut self, entity: EntityType, external_id: &str, message: &str) {
        tracing::warn!(entity_type = %entity, external_id, error = message, "Record failed");
        self.errors.push(format!("{entity} {external_id}: {message}"));
        self.append(
            entity,
            external_id,
            ItemStatus::Error,
            None,
            Some(message.to_string()),
        )
        .await;
    }

    async fn append(
        &mut self,
        entity: EntityType,
        external_id: &str,
        status: ItemStatus,
        internal_id: Option<DbId>,
        error_message: Option<String>,
    ) {
        self.stats.record(entity, status);

        let item = CreateMigrationItem {
            migration_id: self.migration_id,
            entity_type: entity.as_str().to_string(),
            external_id: external_id.to_string(),
            status: status.as_str().to_string(),
            internal_id,
            error_message,
        };
        if let Err(err) = self.store.append_item(&item).await {
            tracing::error!(
                migration_id = self.migration_id,
                entity_type = %entity,
                external_id,
                error = %err,
                "Failed to write ledger row"
            );
            self.errors.push(format!(
                "ledger write failed for {entity} {external_id}: {err}"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MappingError;
    use crate::store::InMemoryStore;
    use tradeflow_db::models::migration_job::CreateMigrationJob;

    async fn open(store: &InMemoryStore) -> DbId {
        store
            .create_job(&CreateMigrationJob {
                org_id: 1,
                user_id: 1,
                source: "external_crm".to_string(),
                dry_run: false,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn one_row_and_one_count_per_call() {
        let store = InMemoryStore::new();
        let migration_id = open(&store).await;
        let mut ledger = Ledger::new(&store, migration_id);

        ledger
            .record(EntityType::Contact, "c-1", Ok(Resolution::Imported(10)))
            .await;
        ledger
            .record(EntityType::Contact, "c-2", Ok(Resolution::Skipped(11)))
            .await;
        ledger
            .record(
                EntityType::Contact,
                "c-3",
                Err(RecordError::Mapping(MappingError::MissingField("id"))),
            )
            .await;

        let items = store.items(migration_id);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].status, "imported");
        assert_eq!(items[0].internal_id, Some(10));
        assert_eq!(items[1].status, "skipped");
        assert_eq!(items[2].status, "error");
        assert_eq!(items[2].internal_id, None);
        assert_eq!(
            items[2].error_message.as_deref(),
            Some("missing required field 'id'")
        );

        let stats = ledger.stats().contacts;
        assert_eq!((stats.imported, stats.skipped, stats.errors), (1, 1, 1));
        assert_eq!(ledger.errors(), ["contact c-3: missing required field 'id'"]);
    }

    #[tokio::test]
    async fn failed_append_is_reported_but_counted() {
        let store = InMemoryStore::new();
        let mut ledger = Ledger::new(&store, 404);

        ledger
            .record(EntityType::Lead, "j-1", Ok(Resolution::Imported(1)))
            .await;

        assert_eq!(ledger.stats().leads.imported, 1);
        assert_eq!(ledger.errors().len(), 1);
        assert!(ledger.errors()[0].starts_with("ledger write failed for lead j-1"));
    }

    #[test]
    fn insert_outcome_maps_to_resolution() {
        assert_eq!(
            Resolution::from(InsertOutcome::Existing(4)),
            Resolution::Skipped(4)
        );
        assert_eq!(Resolution::from(InsertOutcome::Inserted(4)).id(), 4);
    }
}
