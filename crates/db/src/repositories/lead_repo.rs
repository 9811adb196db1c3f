//! Repository for the `leads` table.

use sqlx::PgPool;
use tradeflow_core::types::DbId;

use crate::models::lead::{CreateLead, Lead};

/// Column list for leads queries.
const COLUMNS: &str = "id, org_id, contact_id, property_id, title, description, stage, \
    temperature, estimated_value_cents, external_source, external_id, created_at, updated_at";

pub struct LeadRepo;

impl LeadRepo {
    /// Look up a lead by its dedup key.
    pub async fn find_by_external(
        pool: &PgPool,
        org_id: DbId,
        external_source: &str,
        external_id: &str,
    ) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM leads
             WHERE org_id = $1 AND external_source = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(org_id)
            .bind(external_source)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a lead unless its dedup key already exists.
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateLead,
    ) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!(
            "INSERT INTO leads
                (org_id, contact_id, property_id, title, description, stage,
                 temperature, estimated_value_cents, external_source, external_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT ON CONSTRAINT uq_leads_external DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(input.org_id)
            .bind(input.contact_id)
            .bind(input.property_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.stage)
            .bind(&input.temperature)
            .bind(input.estimated_value_cents)
            .bind(&input.external_source)
            .bind(&input.external_id)
            .fetch_optional(pool)
            .await
    }

    /// List leads attached to a contact.
    pub async fn list_by_contact(
        pool: &PgPool,
        contact_id: DbId,
    ) -> Result<Vec<Lead>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM leads WHERE contact_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(contact_id)
            .fetch_all(pool)
            .await
    }
}
