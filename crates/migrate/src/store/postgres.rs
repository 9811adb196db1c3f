//! [`MigrationStore`] over PostgreSQL.

use async_trait::async_trait;

use tradeflow_core::migration::EntityType;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::contact::CreateContact;
use tradeflow_db::models::lead::CreateLead;
use tradeflow_db::models::migration_item::CreateMigrationItem;
use tradeflow_db::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob, MigrationJob};
use tradeflow_db::models::property::CreateProperty;
use tradeflow_db::models::work_order::CreateWorkOrder;
use tradeflow_db::repositories::{
    ContactRepo, LeadRepo, MigrationItemRepo, MigrationJobRepo, PropertyRepo, WorkOrderRepo,
};
use tradeflow_db::{unique_violation, DbPool};

use super::{DedupKey, InsertOutcome, MigrationStore, StoreError};

/// Store backed by a connection pool. Cheap to clone.
#[derive(Clone)]
pub struct PgMigrationStore {
    pool: DbPool,
}

impl PgMigrationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Turn an `ON CONFLICT DO NOTHING` miss into the id of the row that won.
    async fn settle(
        &self,
        entity: EntityType,
        inserted: Option<DbId>,
        key: DedupKey<'_>,
    ) -> Result<InsertOutcome, StoreError> {
        if let Some(id) = inserted {
            return Ok(InsertOutcome::Inserted(id));
        }
        match self.find_existing(entity, &key).await? {
            Some(id) => Ok(InsertOutcome::Existing(id)),
            None => Err(StoreError::Conflict(format!(
                "uq_{}_external",
                table_name(entity)
            ))),
        }
    }
}

fn table_name(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Contact => "contacts",
        EntityType::Property => "properties",
        EntityType::Lead => "leads",
        EntityType::Job => "work_orders",
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn create_job(&self, input: &CreateMigrationJob) -> Result<MigrationJob, StoreError> {
        MigrationJobRepo::create(&self.pool, input)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(constraint) => StoreError::Conflict(constraint.to_string()),
                None => StoreError::Database(e),
            })
    }

    async fn abandon_stale_jobs(
        &self,
        org_id: DbId,
        started_before: Timestamp,
        reason: &str,
    ) -> Result<u64, StoreError> {
        Ok(MigrationJobRepo::abandon_stale(&self.pool, org_id, started_before, reason).await?)
    }

    async fn finalize_job(
        &self,
        id: DbId,
        input: &FinalizeMigrationJob,
    ) -> Result<(), StoreError> {
        match MigrationJobRepo::finalize(&self.pool, id, input).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::Conflict(format!(
                "migration job {id} is not running"
            ))),
        }
    }

    async fn append_item(&self, input: &CreateMigrationItem) -> Result<(), StoreError> {
        MigrationItemRepo::create(&self.pool, input).await?;
        Ok(())
    }

    async fn find_existing(
        &self,
        entity: EntityType,
        key: &DedupKey<'_>,
    ) -> Result<Option<DbId>, StoreError> {
        let (org, source, ext) = (key.org_id, key.external_source, key.external_id);
        let id = match entity {
            EntityType::Contact => ContactRepo::find_by_external(&self.pool, org, source, ext)
                .await?
                .map(|c| c.id),
            EntityType::Property => PropertyRepo::find_by_external(&self.pool, org, source, ext)
                .await?
                .map(|p| p.id),
            EntityType::Lead => LeadRepo::find_by_external(&self.pool, org, source, ext)
                .await?
                .map(|l| l.id),
            EntityType::Job => WorkOrderRepo::find_by_external(&self.pool, org, source, ext)
                .await?
                .map(|w| w.id),
        };
        Ok(id)
    }

    async fn insert_contact(&self, input: &CreateContact) -> Result<InsertOutcome, StoreError> {
        let inserted = ContactRepo::insert_if_absent(&self.pool, input).await?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        self.settle(EntityType::Contact, inserted.map(|c| c.id), key)
            .await
    }

    async fn insert_property(
        &self,
        input: &CreateProperty,
    ) -> Result<InsertOutcome, StoreError> {
        let inserted = PropertyRepo::insert_if_absent(&self.pool, input).await?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        self.settle(EntityType::Property, inserted.map(|p| p.id), key)
            .await
    }

    async fn insert_lead(&self, input: &CreateLead) -> Result<InsertOutcome, StoreError> {
        let inserted = LeadRepo::insert_if_absent(&self.pool, input).await?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        self.settle(EntityType::Lead, inserted.map(|l| l.id), key)
            .await
    }

    async fn insert_work_order(
        &self,
        input: &CreateWorkOrder,
    ) -> Result<InsertOutcome, StoreError> {
        let inserted = WorkOrderRepo::insert_if_absent(&self.pool, input).await?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        self.settle(EntityType::Job, inserted.map(|w| w.id), key)
            .await
    }
}
