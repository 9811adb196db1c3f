//! Repository for the `contacts` table.

use sqlx::PgPool;
use tradeflow_core::types::DbId;

use crate::models::contact::{Contact, CreateContact};

/// Column list for contacts queries.
const COLUMNS: &str = "id, org_id, first_name, last_name, email, phone, \
    address_line1, address_line2, city, state, postal_code, country, slug, \
    is_placeholder, external_source, external_id, created_at, updated_at";

pub struct ContactRepo;

impl ContactRepo {
    /// Look up a contact by its dedup key.
    pub async fn find_by_external(
        pool: &PgPool,
        org_id: DbId,
        external_source: &str,
        external_id: &str,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contacts
             WHERE org_id = $1 AND external_source = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(external_source)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a contact unless its dedup key already exists.
    ///
    /// Returns `None` when another row already holds the key.
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateContact,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts
                (org_id, first_name, last_name, email, phone, address_line1,
                 address_line2, city, state, postal_code, country, slug,
                 is_placeholder, external_source, external_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT ON CONSTRAINT uq_contacts_external DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(input.org_id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address_line1)
            .bind(&input.address_line2)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(&input.country)
            .bind(&input.slug)
            .bind(input.is_placeholder)
            .bind(&input.external_source)
            .bind(&input.external_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a contact by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contacts WHERE id = $1");
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count contacts an organization received from `external_source`.
    pub async fn count_by_source(
        pool: &PgPool,
        org_id: DbId,
        external_source: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM contacts WHERE org_id = $1 AND external_source = $2",
        )
        .bind(org_id)
        .bind(external_source)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
