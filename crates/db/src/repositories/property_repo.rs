//! Repository for the `properties` table.

use sqlx::PgPool;
use tradeflow_core::types::DbId;

use crate::models::property::{CreateProperty, Property};

/// Column list for properties queries.
const COLUMNS: &str = "id, org_id, name, address_line1, address_line2, city, state, \
    postal_code, country, external_source, external_id, created_at, updated_at";

pub struct PropertyRepo;

impl PropertyRepo {
    /// Look up a property by its dedup key.
    pub async fn find_by_external(
        pool: &PgPool,
        org_id: DbId,
        external_source: &str,
        external_id: &str,
    ) -> Result<Option<Property>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM properties
             WHERE org_id = $1 AND external_source = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, Property>(&query)
            .bind(org_id)
            .bind(external_source)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a property unless its dedup key already exists.
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateProperty,
    ) -> Result<Option<Property>, sqlx::Error> {
        let query = format!(
            "INSERT INTO properties
                (org_id, name, address_line1, address_line2, city, state,
                 postal_code, country, external_source, external_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT ON CONSTRAINT uq_properties_external DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Property>(&query)
            .bind(input.org_id)
            .bind(&input.name)
            .bind(&input.address_line1)
            .bind(&input.address_line2)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(&input.country)
            .bind(&input.external_source)
            .bind(&input.external_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Property>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM properties WHERE id = $1");
        sqlx::query_as::<_, Property>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
