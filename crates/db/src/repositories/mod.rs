//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.
//!
//! Entity inserts made by a migration use `ON CONFLICT DO NOTHING` against
//! the `uq_<table>_external` constraint, so a dedup race between two writers
//! resolves to one row instead of an error.

pub mod contact_repo;
pub mod lead_repo;
pub mod migration_item_repo;
pub mod migration_job_repo;
pub mod property_repo;
pub mod work_order_repo;

pub use contact_repo::ContactRepo;
pub use lead_repo::LeadRepo;
pub use migration_item_repo::MigrationItemRepo;
pub use migration_job_repo::MigrationJobRepo;
pub use property_repo::PropertyRepo;
pub use work_order_repo::WorkOrderRepo;
