//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts

pub mod contact;
pub mod lead;
pub mod migration_item;
pub mod migration_job;
pub mod property;
pub mod work_order;
