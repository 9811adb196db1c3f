//! Per-run cache of placeholder contacts.

use std::collections::HashMap;

use tradeflow_core::migration::{placeholder_external_id, EntityType, EXTERNAL_SOURCE};
use tradeflow_core::types::DbId;

use crate::mapper::placeholder_contact;
use crate::store::{DedupKey, InsertOutcome, MigrationStore, StoreError};

/// Placeholder contact ids by organization, created on first need.
///
/// Constructed fresh for each run and passed down explicitly, so nothing
/// leaks between organizations or between tests.
#[derive(Debug, Default)]
pub struct PlaceholderCache {
    ids: HashMap<DbId, DbId>,
}

impl PlaceholderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, org_id: DbId) -> Option<DbId> {
        self.ids.get(&org_id).copied()
    }

    /// The organization's placeholder contact, looked up or created once per
    /// run. Creation goes through the conflict-safe insert, so a placeholder
    /// made by an earlier or concurrent run is reused.
    pub async fn resolve<S: MigrationStore + ?Sized>(
        &mut self,
        store: &S,
        org_id: DbId,
    ) -> Result<DbId, StoreError> {
        if let Some(id) = self.get(org_id) {
            return Ok(id);
        }

        let external_id = placeholder_external_id(org_id);
        let key = DedupKey::new(org_id, EXTERNAL_SOURCE, &external_id);
        let id = match store.find_existing(EntityType::Contact, &key).await? {
            Some(id) => id,
            None => match store.insert_contact(&placeholder_contact(org_id)).await? {
                InsertOutcome::Inserted(id) => {
                    tracing::info!(org_id, contact_id = id, "Created placeholder contact");
                    id
                }
                InsertOutcome::Existing(id) => id,
            },
        };

        self.ids.insert(org_id, id);
        Ok(id)
    }
}
