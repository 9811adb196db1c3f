//! Pure domain logic for the CRM migration engine.
//!
//! Nothing in this crate performs I/O. The `db` crate persists what is
//! described here and the `migrate` crate drives it.

pub mod currency;
pub mod error;
pub mod migration;
pub mod naming;
pub mod pagination;
pub mod status_rules;
pub mod types;
