//! Integration tests for the migration repositories.
//!
//! Exercises the repository layer against a real database:
//! - Conflict-safe inserts on the dedup key
//! - One running migration per organization
//! - Ledger aggregation by entity type and status
//!
//! Run with `DATABASE_URL` set and `cargo test -- --ignored`.

use sqlx::PgPool;
use tradeflow_core::migration::{MigrationStats, EXTERNAL_SOURCE};
use tradeflow_db::models::contact::CreateContact;
use tradeflow_db::models::lead::CreateLead;
use tradeflow_db::models::migration_item::CreateMigrationItem;
use tradeflow_db::models::migration_job::{CreateMigrationJob, FinalizeMigrationJob};
use tradeflow_db::models::property::CreateProperty;
use tradeflow_db::models::work_order::CreateWorkOrder;
use tradeflow_db::repositories::{
    ContactRepo, LeadRepo, MigrationItemRepo, MigrationJobRepo, PropertyRepo, WorkOrderRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_contact(org_id: i64, external_id: &str) -> CreateContact {
    CreateContact {
        org_id,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: None,
        address_line1: None,
        address_line2: None,
        city: None,
        state: None,
        postal_code: None,
        country: None,
        slug: format!("ada-lovelace-{external_id}"),
        is_placeholder: false,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: external_id.to_string(),
    }
}

fn new_job(org_id: i64) -> CreateMigrationJob {
    CreateMigrationJob {
        org_id,
        user_id: 7,
        source: EXTERNAL_SOURCE.to_string(),
        dry_run: false,
    }
}

fn item(migration_id: i64, entity_type: &str, external_id: &str, status: &str) -> CreateMigrationItem {
    CreateMigrationItem {
        migration_id,
        entity_type: entity_type.to_string(),
        external_id: external_id.to_string(),
        status: status.to_string(),
        internal_id: None,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Test: dedup key
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_if_absent_is_conflict_safe(pool: PgPool) {
    let first = ContactRepo::insert_if_absent(&pool, &new_contact(1, "c-1"))
        .await
        .unwrap();
    assert!(first.is_some(), "first insert should create a row");

    let second = ContactRepo::insert_if_absent(&pool, &new_contact(1, "c-1"))
        .await
        .unwrap();
    assert!(second.is_none(), "second insert should hit the dedup key");

    let other_org = ContactRepo::insert_if_absent(&pool, &new_contact(2, "c-1"))
        .await
        .unwrap();
    assert!(other_org.is_some(), "dedup key is scoped per organization");

    let count = ContactRepo::count_by_source(&pool, 1, EXTERNAL_SOURCE)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let found = ContactRepo::find_by_external(&pool, 1, EXTERNAL_SOURCE, "c-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.unwrap().id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_work_order_requires_existing_property(pool: PgPool) {
    let contact = ContactRepo::insert_if_absent(&pool, &new_contact(1, "c-9"))
        .await
        .unwrap()
        .unwrap();
    let property = PropertyRepo::insert_if_absent(
        &pool,
        &CreateProperty {
            org_id: 1,
            name: "12 Oak St".to_string(),
            address_line1: Some("12 Oak St".to_string()),
            address_line2: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            external_source: EXTERNAL_SOURCE.to_string(),
            external_id: "j-1".to_string(),
        },
    )
    .await
    .unwrap()
    .unwrap();

    let mut input = CreateWorkOrder {
        org_id: 1,
        contact_id: contact.id,
        property_id: property.id,
        title: "Roof".to_string(),
        description: None,
        status: "pending".to_string(),
        work_type: "roofing".to_string(),
        estimated_value_cents: Some(1999),
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: "j-1".to_string(),
    };
    let created = WorkOrderRepo::insert_if_absent(&pool, &input)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.estimated_value_cents, Some(1999));

    let at_property = WorkOrderRepo::list_by_property(&pool, property.id)
        .await
        .unwrap();
    assert_eq!(at_property.len(), 1);
    assert_eq!(at_property[0].id, created.id);
    let stored = PropertyRepo::find_by_id(&pool, property.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "12 Oak St");

    input.external_id = "j-2".to_string();
    input.property_id = property.id + 1000;
    let result = WorkOrderRepo::insert_if_absent(&pool, &input).await;
    assert!(result.is_err(), "foreign key violation expected");
}

// ---------------------------------------------------------------------------
// Test: one running migration per organization
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_abandon_stale_frees_the_org(pool: PgPool) {
    let stale = MigrationJobRepo::create(&pool, &new_job(8)).await.unwrap();
    sqlx::query("UPDATE migration_jobs SET started_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(stale.id)
        .execute(&pool)
        .await
        .unwrap();
    let fresh = MigrationJobRepo::create(&pool, &new_job(9)).await.unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::hours(1);
    let abandoned = MigrationJobRepo::abandon_stale(&pool, 8, cutoff, "abandoned")
        .await
        .unwrap();
    assert_eq!(abandoned, 1);

    let stored = MigrationJobRepo::find_by_id(&pool, stale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.errors, vec!["abandoned".to_string()]);
    assert!(stored.completed_at.is_some());

    // Another org's running job and a recent job are left alone.
    assert_eq!(
        MigrationJobRepo::abandon_stale(&pool, 9, cutoff, "abandoned")
            .await
            .unwrap(),
        0
    );
    let other = MigrationJobRepo::find_by_id(&pool, fresh.id).await.unwrap().unwrap();
    assert_eq!(other.status, "running");

    MigrationJobRepo::create(&pool, &new_job(8)).await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_second_running_job_for_org_is_rejected(pool: PgPool) {
    let job = MigrationJobRepo::create(&pool, &new_job(5)).await.unwrap();
    assert_eq!(job.status, "running");
    let running = MigrationJobRepo::find_running_by_org(&pool, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(running.id, job.id);

    let err = MigrationJobRepo::create(&pool, &new_job(5)).await.unwrap_err();
    assert_eq!(
        tradeflow_db::unique_violation(&err),
        Some("uq_migration_jobs_running_org")
    );

    // A different organization is unaffected.
    MigrationJobRepo::create(&pool, &new_job(6)).await.unwrap();

    let finalized = MigrationJobRepo::finalize(
        &pool,
        job.id,
        &FinalizeMigrationJob {
            status: "completed".to_string(),
            stats: serde_json::to_value(MigrationStats::default()).unwrap(),
            imported_count: 0,
            skipped_count: 0,
            error_count: 0,
            errors: vec![],
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(finalized.status, "completed");
    assert!(finalized.completed_at.is_some());
    assert!(MigrationJobRepo::find_running_by_org(&pool, 5)
        .await
        .unwrap()
        .is_none());
    let stored = MigrationJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");

    // Terminal jobs cannot be finalized again.
    let again = MigrationJobRepo::finalize(
        &pool,
        job.id,
        &FinalizeMigrationJob {
            status: "failed".to_string(),
            stats: serde_json::json!({}),
            imported_count: 0,
            skipped_count: 0,
            error_count: 0,
            errors: vec!["late".to_string()],
        },
    )
    .await
    .unwrap();
    assert!(again.is_none());

    // The org can start a new run once the previous one is terminal.
    MigrationJobRepo::create(&pool, &new_job(5)).await.unwrap();
    let history = MigrationJobRepo::list_by_org(&pool, 5, None, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: ledger aggregation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_ledger_counts_rebuild_stats(pool: PgPool) {
    let job = MigrationJobRepo::create(&pool, &new_job(9)).await.unwrap();

    for (entity, ext, status) in [
        ("contact", "c-1", "imported"),
        ("contact", "c-2", "imported"),
        ("contact", "c-3", "error"),
        ("property", "j-1", "skipped"),
    ] {
        MigrationItemRepo::create(&pool, &item(job.id, entity, ext, status))
            .await
            .unwrap();
    }

    let counts = MigrationItemRepo::count_by_entity_and_status(&pool, job.id)
        .await
        .unwrap();
    let stats = MigrationStats::from_counts(counts);
    assert_eq!(stats.contacts.imported, 2);
    assert_eq!(stats.contacts.errors, 1);
    assert_eq!(stats.properties.skipped, 1);

    let errors = MigrationItemRepo::list_errors(&pool, job.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].external_id, "c-3");

    let all = MigrationItemRepo::list_by_migration(&pool, job.id, None, None)
        .await
        .unwrap();
    let ids: Vec<i64> = all.iter().map(|i| i.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted, "ledger rows come back in write order");
}

// ---------------------------------------------------------------------------
// Test: leads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lead_without_property_lists_under_contact(pool: PgPool) {
    let contact = ContactRepo::insert_if_absent(&pool, &new_contact(3, "c-5"))
        .await
        .unwrap()
        .unwrap();
    let input = CreateLead {
        org_id: 3,
        contact_id: contact.id,
        property_id: None,
        title: "Untitled Job".to_string(),
        description: None,
        stage: "new".to_string(),
        temperature: "cold".to_string(),
        estimated_value_cents: None,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: "j-5".to_string(),
    };
    let lead = LeadRepo::insert_if_absent(&pool, &input).await.unwrap().unwrap();
    assert_eq!(lead.estimated_value_cents, None, "absent amounts stay NULL");
    assert!(LeadRepo::insert_if_absent(&pool, &input).await.unwrap().is_none());

    let leads = LeadRepo::list_by_contact(&pool, contact.id).await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, lead.id);
    assert_eq!(
        LeadRepo::find_by_external(&pool, 3, EXTERNAL_SOURCE, "j-5")
            .await
            .unwrap()
            .map(|l| l.id),
        Some(lead.id)
    );

    let found = ContactRepo::find_by_id(&pool, contact.id).await.unwrap().unwrap();
    assert_eq!(found.slug, contact.slug);
}
