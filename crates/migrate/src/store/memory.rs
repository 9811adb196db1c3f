//! [`MigrationStore`] held in process memory.
//!
//! Enforces the same rules the schema does: one row per dedup key, one
//! running job per organization, and foreign keys from leads and work
//! orders to contacts and properties. With the `test-support` feature,
//! inserts can be made to fail for a chosen record and jobs can be aged so
//! error and recovery paths can be exercised.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use tradeflow_core::migration::{EntityType, MigrationStatus};
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::contact::{Contact, CreateContact};
use tradeflow_db::models::lead::{CreateLead, Lead};
use tradeflow_db::models::migration_item::{CreateMigrationItem, MigrationItem};
use tradeflow_db::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob, MigrationJob};
use tradeflow_db::models::property::{CreateProperty, Property};
use tradeflow_db::models::work_order::{CreateWorkOrder, WorkOrder};

use super::{DedupKey, InsertOutcome, MigrationStore, StoreError, RUNNING_JOB_CONSTRAINT};

#[derive(Default)]
struct State {
    next_id: DbId,
    jobs: Vec<MigrationJob>,
    items: Vec<MigrationItem>,
    contacts: Vec<Contact>,
    properties: Vec<Property>,
    leads: Vec<Lead>,
    work_orders: Vec<WorkOrder>,
    failing_inserts: HashSet<(EntityType, String)>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn check_injected(&self, entity: EntityType, external_id: &str) -> Result<(), StoreError> {
        if self
            .failing_inserts
            .contains(&(entity, external_id.to_string()))
        {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "injected insert failure for {entity} {external_id}"
            ))));
        }
        Ok(())
    }

    fn require_contact(&self, id: DbId) -> Result<(), StoreError> {
        if self.contacts.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(StoreError::MissingDependency {
                entity: "contact",
                id,
            })
        }
    }

    fn require_property(&self, id: DbId) -> Result<(), StoreError> {
        if self.properties.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(StoreError::MissingDependency {
                entity: "property",
                id,
            })
        }
    }

    fn find(&self, entity: EntityType, key: &DedupKey<'_>) -> Option<DbId> {
        let matches = |org: DbId, source: &Option<String>, ext: &Option<String>| {
            org == key.org_id
                && source.as_deref() == Some(key.external_source)
                && ext.as_deref() == Some(key.external_id)
        };
        match entity {
            EntityType::Contact => self
                .contacts
                .iter()
                .find(|r| matches(r.org_id, &r.external_source, &r.external_id))
                .map(|r| r.id),
            EntityType::Property => self
                .properties
                .iter()
                .find(|r| matches(r.org_id, &r.external_source, &r.external_id))
                .map(|r| r.id),
            EntityType::Lead => self
                .leads
                .iter()
                .find(|r| matches(r.org_id, &r.external_source, &r.external_id))
                .map(|r| r.id),
            EntityType::Job => self
                .work_orders
                .iter()
                .find(|r| matches(r.org_id, &r.external_source, &r.external_id))
                .map(|r| r.id),
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert of `entity` with `external_id` fail.
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_inserts(&self, entity: EntityType, external_id: &str) {
        self.lock()
            .failing_inserts
            .insert((entity, external_id.to_string()));
    }

    /// Move a job's start time back by `age`, as if its run had stalled.
    #[cfg(any(test, feature = "test-support"))]
    pub fn age_job(&self, id: DbId, age: chrono::Duration) {
        if let Some(job) = self.lock().jobs.iter_mut().find(|j| j.id == id) {
            job.started_at = job.started_at - age;
        }
    }

    pub fn jobs(&self) -> Vec<MigrationJob> {
        self.lock().jobs.clone()
    }

    pub fn job(&self, id: DbId) -> Option<MigrationJob> {
        self.lock().jobs.iter().find(|j| j.id == id).cloned()
    }

    /// Ledger rows of one run, in write order.
    pub fn items(&self, migration_id: DbId) -> Vec<MigrationItem> {
        self.lock()
            .items
            .iter()
            .filter(|i| i.migration_id == migration_id)
            .cloned()
            .collect()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().contacts.clone()
    }

    pub fn properties(&self) -> Vec<Property> {
        self.lock().properties.clone()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.lock().leads.clone()
    }

    pub fn work_orders(&self) -> Vec<WorkOrder> {
        self.lock().work_orders.clone()
    }

    /// Number of migrated rows across all four entity tables.
    pub fn entity_row_count(&self) -> usize {
        let state = self.lock();
        state.contacts.len() + state.properties.len() + state.leads.len() + state.work_orders.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MigrationStore for InMemoryStore {
    async fn create_job(&self, input: &CreateMigrationJob) -> Result<MigrationJob, StoreError> {
        let mut state = self.lock();
        let running = MigrationStatus::Running.as_str();
        if state
            .jobs
            .iter()
            .any(|j| j.org_id == input.org_id && j.status == running)
        {
            return Err(StoreError::Conflict(RUNNING_JOB_CONSTRAINT.to_string()));
        }

        let now = Utc::now();
        let job = MigrationJob {
            id: state.next_id(),
            org_id: input.org_id,
            user_id: input.user_id,
            source: input.source.clone(),
            status: running.to_string(),
            dry_run: input.dry_run,
            stats: serde_json::json!({}),
            imported_count: 0,
            skipped_count: 0,
            error_count: 0,
            errors: Vec::new(),
            started_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn abandon_stale_jobs(
        &self,
        org_id: DbId,
        started_before: Timestamp,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let running = MigrationStatus::Running.as_str();
        let now = Utc::now();
        let mut abandoned = 0;
        for job in state.jobs.iter_mut().filter(|j| {
            j.org_id == org_id && j.status == running && j.started_at <= started_before
        }) {
            job.status = MigrationStatus::Failed.as_str().to_string();
            job.errors.push(reason.to_string());
            job.completed_at = Some(now);
            job.updated_at = now;
            abandoned += 1;
        }
        Ok(abandoned)
    }

    async fn finalize_job(
        &self,
        id: DbId,
        input: &FinalizeMigrationJob,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == MigrationStatus::Running.as_str())
            .ok_or_else(|| StoreError::Conflict(format!("migration job {id} is not running")))?;

        let now = Utc::now();
        job.status = input.status.clone();
        job.stats = input.stats.clone();
        job.imported_count = input.imported_count;
        job.skipped_count = input.skipped_count;
        job.error_count = input.error_count;
        job.errors = input.errors.clone();
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn append_item(&self, input: &CreateMigrationItem) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.jobs.iter().any(|j| j.id == input.migration_id) {
            return Err(StoreError::MissingDependency {
                entity: "migration job",
                id: input.migration_id,
            });
        }
        let item = MigrationItem {
            id: state.next_id(),
            migration_id: input.migration_id,
            entity_type: input.entity_type.clone(),
            external_id: input.external_id.clone(),
            status: input.status.clone(),
            internal_id: input.internal_id,
            error_message: input.error_message.clone(),
            created_at: Utc::now(),
        };
        state.items.push(item);
        Ok(())
    }

    async fn find_existing(
        &self,
        entity: EntityType,
        key: &DedupKey<'_>,
    ) -> Result<Option<DbId>, StoreError> {
        Ok(self.lock().find(entity, key))
    }

    async fn insert_contact(&self, input: &CreateContact) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.check_injected(EntityType::Contact, &input.external_id)?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        if let Some(id) = state.find(EntityType::Contact, &key) {
            return Ok(InsertOutcome::Existing(id));
        }

        let now = Utc::now();
        let id = state.next_id();
        state.contacts.push(Contact {
            id,
            org_id: input.org_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            address_line1: input.address_line1.clone(),
            address_line2: input.address_line2.clone(),
            city: input.city.clone(),
            state: input.state.clone(),
            postal_code: input.postal_code.clone(),
            country: input.country.clone(),
            slug: input.slug.clone(),
            is_placeholder: input.is_placeholder,
            external_source: Some(input.external_source.clone()),
            external_id: Some(input.external_id.clone()),
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn insert_property(
        &self,
        input: &CreateProperty,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.check_injected(EntityType::Property, &input.external_id)?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        if let Some(id) = state.find(EntityType::Property, &key) {
            return Ok(InsertOutcome::Existing(id));
        }

        let now = Utc::now();
        let id = state.next_id();
        state.properties.push(Property {
            id,
            org_id: input.org_id,
            name: input.name.clone(),
            address_line1: input.address_line1.clone(),
            address_line2: input.address_line2.clone(),
            city: input.city.clone(),
            state: input.state.clone(),
            postal_code: input.postal_code.clone(),
            country: input.country.clone(),
            external_source: Some(input.external_source.clone()),
            external_id: Some(input.external_id.clone()),
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn insert_lead(&self, input: &CreateLead) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.check_injected(EntityType::Lead, &input.external_id)?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        if let Some(id) = state.find(EntityType::Lead, &key) {
            return Ok(InsertOutcome::Existing(id));
        }
        state.require_contact(input.contact_id)?;
        if let Some(property_id) = input.property_id {
            state.require_property(property_id)?;
        }

        let now = Utc::now();
        let id = state.next_id();
        state.leads.push(Lead {
            id,
            org_id: input.org_id,
            contact_id: input.contact_id,
            property_id: input.property_id,
            title: input.title.clone(),
            description: input.description.clone(),
            stage: input.stage.clone(),
            temperature: input.temperature.clone(),
            estimated_value_cents: input.estimated_value_cents,
            external_source: Some(input.external_source.clone()),
            external_id: Some(input.external_id.clone()),
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn insert_work_order(
        &self,
        input: &CreateWorkOrder,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.check_injected(EntityType::Job, &input.external_id)?;
        let key = DedupKey::new(input.org_id, &input.external_source, &input.external_id);
        if let Some(id) = state.find(EntityType::Job, &key) {
            return Ok(InsertOutcome::Existing(id));
        }
        state.require_contact(input.contact_id)?;
        state.require_property(input.property_id)?;

        let now = Utc::now();
        let id = state.next_id();
        state.work_orders.push(WorkOrder {
            id,
            org_id: input.org_id,
            contact_id: input.contact_id,
            property_id: input.property_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: input.status.clone(),
            work_type: input.work_type.clone(),
            estimated_value_cents: input.estimated_value_cents,
            external_source: Some(input.external_source.clone()),
            external_id: Some(input.external_id.clone()),
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn contact(org_id: DbId, external_id: &str) -> CreateContact {
        let mut input = crate::mapper::placeholder_contact(org_id);
        input.external_id = external_id.to_string();
        input.is_placeholder = false;
        input
    }

    fn job_input(org_id: DbId) -> CreateMigrationJob {
        CreateMigrationJob {
            org_id,
            user_id: 1,
            source: "external_crm".to_string(),
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn second_insert_with_same_key_is_existing() {
        let store = InMemoryStore::new();
        let first = store.insert_contact(&contact(1, "c-1")).await.unwrap();
        let second = store.insert_contact(&contact(1, "c-1")).await.unwrap();

        assert_matches!(first, InsertOutcome::Inserted(_));
        assert_eq!(second, InsertOutcome::Existing(first.id()));
        assert_eq!(store.contacts().len(), 1);

        // Same external id in another org is a different record.
        let other = store.insert_contact(&contact(2, "c-1")).await.unwrap();
        assert_matches!(other, InsertOutcome::Inserted(_));
    }

    #[tokio::test]
    async fn one_running_job_per_org() {
        let store = InMemoryStore::new();
        let job = store.create_job(&job_input(1)).await.unwrap();

        assert_matches!(
            store.create_job(&job_input(1)).await,
            Err(StoreError::Conflict(c)) if c == RUNNING_JOB_CONSTRAINT
        );
        store.create_job(&job_input(2)).await.unwrap();

        let finalize = FinalizeMigrationJob {
            status: "completed".to_string(),
            stats: serde_json::json!({}),
            imported_count: 0,
            skipped_count: 0,
            error_count: 0,
            errors: vec![],
        };
        store.finalize_job(job.id, &finalize).await.unwrap();
        assert!(store.finalize_job(job.id, &finalize).await.is_err());
        store.create_job(&job_input(1)).await.unwrap();
    }

    #[tokio::test]
    async fn abandoning_stale_jobs_frees_the_org() {
        let store = InMemoryStore::new();
        let stale = store.create_job(&job_input(1)).await.unwrap();
        store.age_job(stale.id, chrono::Duration::hours(2));
        let fresh = store.create_job(&job_input(2)).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.abandon_stale_jobs(1, cutoff, "gone").await.unwrap(), 1);
        assert_eq!(store.abandon_stale_jobs(2, cutoff, "gone").await.unwrap(), 0);

        let job = store.job(stale.id).unwrap();
        assert_eq!(job.status, "failed");
        assert_eq!(job.errors, vec!["gone".to_string()]);
        assert!(job.completed_at.is_some());
        assert_eq!(store.job(fresh.id).unwrap().status, "running");

        store.create_job(&job_input(1)).await.unwrap();
    }

    #[tokio::test]
    async fn work_order_requires_existing_property() {
        let store = InMemoryStore::new();
        let contact_id = store.insert_contact(&contact(1, "c-1")).await.unwrap().id();
        let input = CreateWorkOrder {
            org_id: 1,
            contact_id,
            property_id: 999,
            title: "t".to_string(),
            description: None,
            status: "pending".to_string(),
            work_type: "general".to_string(),
            estimated_value_cents: None,
            external_source: "external_crm".to_string(),
            external_id: "j-1".to_string(),
        };
        assert_matches!(
            store.insert_work_order(&input).await,
            Err(StoreError::MissingDependency { entity: "property", id: 999 })
        );
        assert!(store.work_orders().is_empty());
    }

    #[tokio::test]
    async fn injected_failure_hits_only_the_chosen_record() {
        let store = InMemoryStore::new();
        store.fail_inserts(EntityType::Contact, "c-2");

        assert!(store.insert_contact(&contact(1, "c-1")).await.is_ok());
        assert_matches!(
            store.insert_contact(&contact(1, "c-2")).await,
            Err(StoreError::Database(_))
        );
    }
}
