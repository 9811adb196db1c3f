//! Repository for the `work_orders` table.

use sqlx::PgPool;
use tradeflow_core::types::DbId;

use crate::models::work_order::{CreateWorkOrder, WorkOrder};

/// Column list for work_orders queries.
const COLUMNS: &str = "id, org_id, contact_id, property_id, title, description, status, \
    work_type, estimated_value_cents, external_source, external_id, created_at, updated_at";

pub struct WorkOrderRepo;

impl WorkOrderRepo {
    /// Look up a work order by its dedup key.
    pub async fn find_by_external(
        pool: &PgPool,
        org_id: DbId,
        external_source: &str,
        external_id: &str,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM work_orders
             WHERE org_id = $1 AND external_source = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(org_id)
            .bind(external_source)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a work order unless its dedup key already exists.
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateWorkOrder,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        let query = format!(
            "INSERT INTO work_orders
                (org_id, contact_id, property_id, title, description, status,
                 work_type, estimated_value_cents, external_source, external_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT ON CONSTRAINT uq_work_orders_external DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(input.org_id)
            .bind(input.contact_id)
            .bind(input.property_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.status)
            .bind(&input.work_type)
            .bind(input.estimated_value_cents)
            .bind(&input.external_source)
            .bind(&input.external_id)
            .fetch_optional(pool)
            .await
    }

    /// List work orders at a property.
    pub async fn list_by_property(
        pool: &PgPool,
        property_id: DbId,
    ) -> Result<Vec<WorkOrder>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM work_orders WHERE property_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(property_id)
            .fetch_all(pool)
            .await
    }
}
