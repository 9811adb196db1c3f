//! Repository for the `migration_jobs` table.

use sqlx::PgPool;
use tradeflow_core::migration::MigrationStatus;
use tradeflow_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use tradeflow_core::types::{DbId, Timestamp};

use crate::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob, MigrationJob};

/// Column list for migration_jobs queries.
const COLUMNS: &str = "id, org_id, user_id, source, status, dry_run, stats, \
    imported_count, skipped_count, error_count, errors, started_at, completed_at, \
    created_at, updated_at";

/// Run history and status for migrations.
pub struct MigrationJobRepo;

impl MigrationJobRepo {
    /// Open a job in `running` status.
    ///
    /// Fails with a unique violation on `uq_migration_jobs_running_org`
    /// when the organization already has a running migration.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMigrationJob,
    ) -> Result<MigrationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO migration_jobs (org_id, user_id, source, status, dry_run)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(input.org_id)
            .bind(input.user_id)
            .bind(&input.source)
            .bind(MigrationStatus::Running.as_str())
            .bind(input.dry_run)
            .fetch_one(pool)
            .await
    }

    /// Write the terminal status, aggregates and error list.
    ///
    /// Only a `running` job can be finalized; returns `None` otherwise.
    pub async fn finalize(
        pool: &PgPool,
        id: DbId,
        input: &FinalizeMigrationJob,
    ) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs SET
                status = $2,
                stats = $3,
                imported_count = $4,
                skipped_count = $5,
                error_count = $6,
                errors = $7,
                completed_at = NOW()
             WHERE id = $1 AND status = 'running'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .bind(&input.status)
            .bind(&input.stats)
            .bind(input.imported_count)
            .bind(input.skipped_count)
            .bind(input.error_count)
            .bind(&input.errors)
            .fetch_optional(pool)
            .await
    }

    /// Fail the organization's running jobs started at or before
    /// `started_before`, appending `reason` to their errors.
    ///
    /// A crashed process never finalizes its job, and the running row would
    /// otherwise block every later migration for the organization.
    pub async fn abandon_stale(
        pool: &PgPool,
        org_id: DbId,
        started_before: Timestamp,
        reason: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE migration_jobs SET
                status = $4,
                errors = array_append(errors, $3),
                completed_at = NOW()
             WHERE org_id = $1 AND status = 'running' AND started_at <= $2",
        )
        .bind(org_id)
        .bind(started_before)
        .bind(reason)
        .bind(MigrationStatus::Failed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM migration_jobs WHERE id = $1");
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The organization's running migration, if any.
    pub async fn find_running_by_org(
        pool: &PgPool,
        org_id: DbId,
    ) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs
             WHERE org_id = $1 AND status = 'running'"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(org_id)
            .fetch_optional(pool)
            .await
    }

    /// List migrations for an organization, newest first.
    pub async fn list_by_org(
        pool: &PgPool,
        org_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<MigrationJob>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
        let offset = clamp_offset(offset);
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs
             WHERE org_id = $1
             ORDER BY started_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(org_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
