//! Repository for the `migration_items` audit ledger.
//!
//! The ledger is append-only: there are no update or delete methods.

use sqlx::PgPool;
use tradeflow_core::pagination::{
    clamp_limit, clamp_offset, DEFAULT_LEDGER_LIMIT, MAX_LEDGER_LIMIT,
};
use tradeflow_core::types::DbId;

use crate::models::migration_item::{CreateMigrationItem, MigrationItem};

/// Column list for migration_items queries.
const COLUMNS: &str = "id, migration_id, entity_type, external_id, status, internal_id, \
    error_message, created_at";

pub struct MigrationItemRepo;

impl MigrationItemRepo {
    /// Append a ledger row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMigrationItem,
    ) -> Result<MigrationItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO migration_items
                (migration_id, entity_type, external_id, status, internal_id, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationItem>(&query)
            .bind(input.migration_id)
            .bind(&input.entity_type)
            .bind(&input.external_id)
            .bind(&input.status)
            .bind(input.internal_id)
            .bind(&input.error_message)
            .fetch_one(pool)
            .await
    }

    /// List ledger rows for a run in write order.
    pub async fn list_by_migration(
        pool: &PgPool,
        migration_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<MigrationItem>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_LEDGER_LIMIT, MAX_LEDGER_LIMIT);
        let offset = clamp_offset(offset);
        let query = format!(
            "SELECT {COLUMNS} FROM migration_items
             WHERE migration_id = $1
             ORDER BY id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, MigrationItem>(&query)
            .bind(migration_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// All `error` rows for a run in write order.
    pub async fn list_errors(
        pool: &PgPool,
        migration_id: DbId,
    ) -> Result<Vec<MigrationItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_items
             WHERE migration_id = $1 AND status = 'error'
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, MigrationItem>(&query)
            .bind(migration_id)
            .fetch_all(pool)
            .await
    }

    /// Count ledger rows grouped by entity type and status for a run.
    ///
    /// Returns tuples of (entity_type, status, count).
    pub async fn count_by_entity_and_status(
        pool: &PgPool,
        migration_id: DbId,
    ) -> Result<Vec<(String, String, i64)>, sqlx::Error> {
        let rows: Vec<EntityStatusCount> = sqlx::query_as(
            "SELECT entity_type, status, COUNT(*) AS count FROM migration_items
             WHERE migration_id = $1
             GROUP BY entity_type, status
             ORDER BY entity_type, status",
        )
        .bind(migration_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.entity_type, r.status, r.count))
            .collect())
    }
}

/// Helper struct for the count_by_entity_and_status query.
#[derive(sqlx::FromRow)]
struct EntityStatusCount {
    entity_type: String,
    status: String,
    count: i64,
}
