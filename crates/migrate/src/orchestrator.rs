//! One end-to-end migration for one organization.
//!
//! A run opens a Migration Job before any network I/O, validates the
//! credential, then walks two phases in strict order: every contact, then
//! every job record (which fans out into property, lead and work order).
//! Per-record failures are written to the ledger and never stop the run.
//! Only a failed credential check or a failed fetch marks the job `failed`.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use tradeflow_core::migration::{EntityType, MigrationStats, MigrationStatus, EXTERNAL_SOURCE};
use tradeflow_core::types::DbId;
use tradeflow_db::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob, MigrationJob};
use tradeflow_db::DbPool;

use crate::client::{ApiError, CrmClient, Resource};
use crate::config::ClientConfig;
use crate::error::{MigrationError, RecordError};
use crate::external::ExternalJob;
use crate::ledger::{Ledger, Resolution};
use crate::mapper::{
    map_contact, map_lead, map_property, map_work_order, parse_contact, parse_job,
    record_external_id,
};
use crate::placeholder::PlaceholderCache;
use crate::source::CrmSource;
use crate::store::{DedupKey, MigrationStore, PgMigrationStore, StoreError, RUNNING_JOB_CONSTRAINT};

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// Input to [`run_migration`] and [`Migrator::run`].
#[derive(Clone, Deserialize, Validate)]
pub struct MigrationRequest {
    #[validate(range(min = 1))]
    pub org_id: DbId,
    #[validate(range(min = 1))]
    pub user_id: DbId,
    /// Bearer token for the source API.
    #[validate(length(min = 1))]
    pub credential: String,
    #[validate(url)]
    pub base_url_override: Option<String>,
    /// Validate the credential only.
    #[serde(default)]
    pub dry_run: bool,
}

impl std::fmt::Debug for MigrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRequest")
            .field("org_id", &self.org_id)
            .field("user_id", &self.user_id)
            .field("credential", &"<redacted>")
            .field("base_url_override", &self.base_url_override)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub migration_id: DbId,
    pub status: MigrationStatus,
    pub stats: MigrationStats,
    /// Every per-record error message, plus the fatal one if the run failed.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// A failure that ends the run as `failed`.
#[derive(Debug, thiserror::Error)]
enum RunFailure {
    #[error("Could not build source client: {0}")]
    Client(ApiError),

    #[error("Connection test failed: {0}")]
    Connection(String),

    #[error("Failed to fetch {resource}: {error}")]
    Fetch { resource: Resource, error: ApiError },
}

/// An upstream id, or why it could not be resolved.
type Dependency = Result<DbId, String>;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run one migration against PostgreSQL with default client settings.
pub async fn run_migration(
    pool: DbPool,
    request: &MigrationRequest,
) -> Result<MigrationResult, MigrationError> {
    Migrator::new(PgMigrationStore::new(pool), ClientConfig::default())
        .run(request)
        .await
}

/// How long a job may stay `running` before a new run treats it as crashed.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Drives migrations against one store.
pub struct Migrator<S> {
    store: S,
    client_config: ClientConfig,
    stale_after: Duration,
}

impl<S: MigrationStore> Migrator<S> {
    pub fn new(store: S, client_config: ClientConfig) -> Self {
        Self {
            store,
            client_config,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Age past which a leftover `running` job is failed so a new run can start.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a migration against the live source API.
    ///
    /// Returns `Err` only when the Migration Job could not be opened. Any
    /// later failure comes back as a result with `success == false`.
    #[tracing::instrument(
        skip_all,
        fields(org_id = request.org_id, migration_id = tracing::field::Empty)
    )]
    pub async fn run(&self, request: &MigrationRequest) -> Result<MigrationResult, MigrationError> {
        let started = Instant::now();
        let job = self.open_job(request).await?;

        let mut config = self.client_config.clone();
        if let Some(base_url) = &request.base_url_override {
            config.base_url = base_url.clone();
        }

        match CrmClient::new(&config, request.credential.clone()) {
            Ok(client) => Ok(self.drive(&job, request, &client, started).await),
            Err(err) => {
                let ledger = Ledger::new(&self.store, job.id);
                Ok(self.finish(ledger, Err(RunFailure::Client(err)), started).await)
            }
        }
    }

    /// Run a migration against an arbitrary source.
    #[tracing::instrument(
        skip_all,
        fields(org_id = request.org_id, migration_id = tracing::field::Empty)
    )]
    pub async fn run_with_source<C: CrmSource + ?Sized>(
        &self,
        request: &MigrationRequest,
        source: &C,
    ) -> Result<MigrationResult, MigrationError> {
        let started = Instant::now();
        let job = self.open_job(request).await?;
        Ok(self.drive(&job, request, source, started).await)
    }

    // ---- run lifecycle ----

    async fn open_job(&self, request: &MigrationRequest) -> Result<MigrationJob, MigrationError> {
        request.validate()?;
        self.abandon_stale_jobs(request.org_id).await?;

        let input = CreateMigrationJob {
            org_id: request.org_id,
            user_id: request.user_id,
            source: EXTERNAL_SOURCE.to_string(),
            dry_run: request.dry_run,
        };
        let job = self.store.create_job(&input).await.map_err(|err| match err {
            StoreError::Conflict(constraint) if constraint == RUNNING_JOB_CONSTRAINT => {
                MigrationError::AlreadyRunning {
                    org_id: request.org_id,
                }
            }
            other => MigrationError::Store(other),
        })?;

        tracing::Span::current().record("migration_id", job.id);
        tracing::info!(migration_id = job.id, dry_run = request.dry_run, "Migration started");
        Ok(job)
    }

    /// Fail running jobs older than `stale_after`. Their process died before
    /// finalizing, and the running row would block this org indefinitely.
    async fn abandon_stale_jobs(&self, org_id: DbId) -> Result<(), MigrationError> {
        let cutoff = chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return Ok(());
        };

        let reason = format!(
            "Abandoned: still running after {}s, presumed crashed",
            self.stale_after.as_secs()
        );
        let abandoned = self
            .store
            .abandon_stale_jobs(org_id, cutoff, &reason)
            .await?;
        if abandoned > 0 {
            tracing::warn!(org_id, abandoned, "Failed stale running migration");
        }
        Ok(())
    }

    async fn drive<C: CrmSource + ?Sized>(
        &self,
        job: &MigrationJob,
        request: &MigrationRequest,
        source: &C,
        started: Instant,
    ) -> MigrationResult {
        let mut ledger = Ledger::new(&self.store, job.id);
        let outcome = self.execute(request, source, &mut ledger).await;
        self.finish(ledger, outcome, started).await
    }

    async fn execute<C: CrmSource + ?Sized>(
        &self,
        request: &MigrationRequest,
        source: &C,
        ledger: &mut Ledger<'_, S>,
    ) -> Result<(), RunFailure> {
        let check = source.test_connection().await;
        if !check.ok {
            return Err(RunFailure::Connection(
                check.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        if request.dry_run {
            tracing::info!("Dry run: credential accepted, nothing imported");
            return Ok(());
        }

        let contacts = source.fetch_contacts().await.map_err(|error| RunFailure::Fetch {
            resource: Resource::Contacts,
            error,
        })?;
        self.contact_phase(request.org_id, &contacts, ledger).await;

        let jobs = source.fetch_jobs().await.map_err(|error| RunFailure::Fetch {
            resource: Resource::Jobs,
            error,
        })?;
        self.job_phase(request.org_id, &jobs, ledger).await;

        Ok(())
    }

    async fn finish(
        &self,
        ledger: Ledger<'_, S>,
        outcome: Result<(), RunFailure>,
        started: Instant,
    ) -> MigrationResult {
        let migration_id = ledger.migration_id();
        let (stats, mut errors) = ledger.into_parts();

        let status = match outcome {
            Ok(()) => MigrationStatus::Completed,
            Err(failure) => {
                tracing::error!(migration_id, error = %failure, "Migration failed");
                errors.push(failure.to_string());
                MigrationStatus::Failed
            }
        };

        let finalize = FinalizeMigrationJob {
            status: status.as_str().to_string(),
            stats: serde_json::to_value(stats).unwrap_or_default(),
            imported_count: as_count(stats.total_imported()),
            skipped_count: as_count(stats.total_skipped()),
            error_count: as_count(stats.total_errors()),
            errors: errors.clone(),
        };

        let mut success = status == MigrationStatus::Completed;
        if let Err(err) = self.store.finalize_job(migration_id, &finalize).await {
            tracing::error!(migration_id, error = %err, "Failed to finalize migration job");
            errors.push(format!("Failed to finalize migration job: {err}"));
            success = false;
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            migration_id,
            status = %status,
            imported = stats.total_imported(),
            skipped = stats.total_skipped(),
            errors = stats.total_errors(),
            duration_ms,
            "Migration finished"
        );

        MigrationResult {
            success,
            migration_id,
            status,
            stats,
            errors,
            duration_ms,
        }
    }

    // ---- contact phase ----

    async fn contact_phase(&self, org_id: DbId, records: &[Value], ledger: &mut Ledger<'_, S>) {
        tracing::info!(count = records.len(), "Contact phase starting");
        for (index, record) in records.iter().enumerate() {
            let external_id = record_external_id(record, index);
            let outcome = self.import_contact(org_id, record).await;
            ledger.record(EntityType::Contact, &external_id, outcome).await;
        }
        tracing::info!(stats = ?ledger.stats().contacts, "Contact phase finished");
    }

    async fn import_contact(&self, org_id: DbId, record: &Value) -> Result<Resolution, RecordError> {
        let contact = parse_contact(record)?;
        let key = DedupKey::new(org_id, EXTERNAL_SOURCE, &contact.id);
        if let Some(id) = self.store.find_existing(EntityType::Contact, &key).await? {
            return Ok(Resolution::Skipped(id));
        }
        let outcome = self.store.insert_contact(&map_contact(org_id, &contact)).await?;
        Ok(outcome.into())
    }

    // ---- job phase ----

    async fn job_phase(&self, org_id: DbId, records: &[Value], ledger: &mut Ledger<'_, S>) {
        tracing::info!(count = records.len(), "Job phase starting");
        let mut placeholders = PlaceholderCache::new();
        for (index, record) in records.iter().enumerate() {
            self.import_job(org_id, index, record, &mut placeholders, ledger)
                .await;
        }
        tracing::info!(
            properties = ?ledger.stats().properties,
            leads = ?ledger.stats().leads,
            jobs = ?ledger.stats().jobs,
            "Job phase finished"
        );
    }

    /// Property, then contact, then lead, then work order. Each of the three
    /// target entities gets exactly one ledger row.
    async fn import_job(
        &self,
        org_id: DbId,
        index: usize,
        record: &Value,
        placeholders: &mut PlaceholderCache,
        ledger: &mut Ledger<'_, S>,
    ) {
        let job = match parse_job(record) {
            Ok(job) => job,
            Err(err) => {
                let external_id = record_external_id(record, index);
                let message = err.to_string();
                for entity in [EntityType::Property, EntityType::Lead, EntityType::Job] {
                    ledger.failed(entity, &external_id, &message).await;
                }
                return;
            }
        };
        let key = DedupKey::new(org_id, EXTERNAL_SOURCE, &job.id);

        let property = self.import_property(org_id, &job, &key).await;
        let property_dep: Dependency = match &property {
            Ok(resolution) => Ok(resolution.id()),
            Err(err) => Err(format!("property ({err})")),
        };
        ledger.record(EntityType::Property, &job.id, property).await;

        let existing_lead = self.store.find_existing(EntityType::Lead, &key).await;
        let existing_order = self.store.find_existing(EntityType::Job, &key).await;

        // The contact, and possibly the placeholder, is only needed when
        // something is left to insert.
        let contact_dep: Option<Dependency> =
            if matches!(existing_lead, Ok(None)) || matches!(existing_order, Ok(None)) {
                Some(
                    self.resolve_job_contact(org_id, &job, placeholders)
                        .await
                        .map_err(|err| format!("contact ({err})")),
                )
            } else {
                None
            };

        let property_id = property_dep.as_ref().ok().copied();
        let lead = self
            .import_lead(org_id, &job, existing_lead, contact_dep.as_ref(), property_id)
            .await;
        ledger.record(EntityType::Lead, &job.id, lead).await;

        let order = self
            .import_work_order(
                org_id,
                &job,
                existing_order,
                contact_dep.as_ref(),
                &property_dep,
            )
            .await;
        ledger.record(EntityType::Job, &job.id, order).await;
    }

    async fn import_property(
        &self,
        org_id: DbId,
        job: &ExternalJob,
        key: &DedupKey<'_>,
    ) -> Result<Resolution, RecordError> {
        if let Some(id) = self.store.find_existing(EntityType::Property, key).await? {
            return Ok(Resolution::Skipped(id));
        }
        let outcome = self.store.insert_property(&map_property(org_id, job)).await?;
        Ok(outcome.into())
    }

    /// The migrated contact the job links to, else the org's placeholder.
    async fn resolve_job_contact(
        &self,
        org_id: DbId,
        job: &ExternalJob,
        placeholders: &mut PlaceholderCache,
    ) -> Result<DbId, StoreError> {
        if let Some(contact_ext_id) = &job.contact_id {
            let key = DedupKey::new(org_id, EXTERNAL_SOURCE, contact_ext_id);
            if let Some(id) = self.store.find_existing(EntityType::Contact, &key).await? {
                return Ok(id);
            }
            tracing::debug!(
                external_id = %job.id,
                contact_external_id = %contact_ext_id,
                "Linked contact not migrated, using placeholder"
            );
        }
        placeholders.resolve(&self.store, org_id).await
    }

    async fn import_lead(
        &self,
        org_id: DbId,
        job: &ExternalJob,
        existing: Result<Option<DbId>, StoreError>,
        contact: Option<&Dependency>,
        property_id: Option<DbId>,
    ) -> Result<Resolution, RecordError> {
        if let Some(id) = existing? {
            return Ok(Resolution::Skipped(id));
        }
        let contact_id = require(contact, "contact")?;
        let input = map_lead(org_id, job, contact_id, property_id)?;
        Ok(self.store.insert_lead(&input).await?.into())
    }

    async fn import_work_order(
        &self,
        org_id: DbId,
        job: &ExternalJob,
        existing: Result<Option<DbId>, StoreError>,
        contact: Option<&Dependency>,
        property: &Dependency,
    ) -> Result<Resolution, RecordError> {
        if let Some(id) = existing? {
            return Ok(Resolution::Skipped(id));
        }
        let property_id = require(Some(property), "property")?;
        let contact_id = require(contact, "contact")?;
        let input = map_work_order(org_id, job, contact_id, property_id)?;
        Ok(self.store.insert_work_order(&input).await?.into())
    }
}

/// Unwrap a dependency or explain why the dependent step was not attempted.
fn require(dependency: Option<&Dependency>, name: &str) -> Result<DbId, RecordError> {
    match dependency {
        Some(Ok(id)) => Ok(*id),
        Some(Err(reason)) => Err(RecordError::DependencyUnresolved(reason.clone())),
        None => Err(RecordError::DependencyUnresolved(name.to_string())),
    }
}

fn as_count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
