//! CRM migration engine.
//!
//! Pulls contacts and jobs from the source CRM's REST API, maps them onto
//! the target schema and imports them idempotently, writing one audit
//! ledger row per record. [`run_migration`] is the library entry point.

pub mod client;
pub mod config;
pub mod error;
pub mod external;
pub mod ledger;
pub mod mapper;
pub mod orchestrator;
pub mod placeholder;
pub mod source;
pub mod store;

pub use error::MigrationError;
pub use orchestrator::{run_migration, MigrationRequest, MigrationResult, Migrator};
