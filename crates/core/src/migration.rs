//! Vocabulary for migration runs and their audit ledger.
//!
//! Status and entity-type enums round-trip through the strings stored in
//! `migration_jobs.status`, `migration_items.status` and
//! `migration_items.entity_type`.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Value written to `external_source` on every migrated row.
pub const EXTERNAL_SOURCE: &str = "external_crm";

/// First name given to the per-organization placeholder contact.
pub const PLACEHOLDER_FIRST_NAME: &str = "Unassigned";

/// Last name given to the per-organization placeholder contact.
pub const PLACEHOLDER_LAST_NAME: &str = "Contact";

/// Deterministic external id of the placeholder contact for `org_id`.
///
/// The placeholder shares the dedup key space with real contacts, so
/// repeated runs upsert the same row instead of creating a new one.
pub fn placeholder_external_id(org_id: DbId) -> String {
    format!("placeholder:{org_id}")
}

// ---------------------------------------------------------------------------
// Migration Status
// ---------------------------------------------------------------------------

/// Lifecycle of a migration job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Running,
    Completed,
    Failed,
}

impl MigrationStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub const ALL: &'static [&'static str] = &["running", "completed", "failed"];
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Item Status
// ---------------------------------------------------------------------------

/// Outcome of one processing attempt for one external record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Imported,
    Skipped,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "imported" => Some(Self::Imported),
            "skipped" => Some(Self::Skipped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["imported", "skipped", "error"];
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity Type
// ---------------------------------------------------------------------------

/// Target entity types written by a migration, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Contact,
    Property,
    Lead,
    Job,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Property => "property",
            Self::Lead => "lead",
            Self::Job => "job",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(Self::Contact),
            "property" => Some(Self::Property),
            "lead" => Some(Self::Lead),
            "job" => Some(Self::Job),
            _ => None,
        }
    }

    /// All entity types in the order a run writes them.
    pub const ORDERED: [EntityType; 4] = [Self::Contact, Self::Property, Self::Lead, Self::Job];
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Outcome counters for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub imported: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl EntityStats {
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Imported => self.imported += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Error => self.errors += 1,
        }
    }

    /// Number of ledger rows these counters account for.
    pub fn total(&self) -> u32 {
        self.imported + self.skipped + self.errors
    }
}

/// Per-entity outcome counters for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub contacts: EntityStats,
    pub properties: EntityStats,
    pub leads: EntityStats,
    pub jobs: EntityStats,
}

impl MigrationStats {
    pub fn entity(&self, entity_type: EntityType) -> &EntityStats {
        match entity_type {
            EntityType::Contact => &self.contacts,
            EntityType::Property => &self.properties,
            EntityType::Lead => &self.leads,
            EntityType::Job => &self.jobs,
        }
    }

    pub fn entity_mut(&mut self, entity_type: EntityType) -> &mut EntityStats {
        match entity_type {
            EntityType::Contact => &mut self.contacts,
            EntityType::Property => &mut self.properties,
            EntityType::Lead => &mut self.leads,
            EntityType::Job => &mut self.jobs,
        }
    }

    pub fn record(&mut self, entity_type: EntityType, status: ItemStatus) {
        self.entity_mut(entity_type).record(status);
    }

    /// Sum of a counter across all four entity types.
    pub fn total_imported(&self) -> u32 {
        EntityType::ORDERED.iter().map(|t| self.entity(*t).imported).sum()
    }

    pub fn total_skipped(&self) -> u32 {
        EntityType::ORDERED.iter().map(|t| self.entity(*t).skipped).sum()
    }

    pub fn total_errors(&self) -> u32 {
        EntityType::ORDERED.iter().map(|t| self.entity(*t).errors).sum()
    }

    /// Rebuild stats from `(entity_type, status, count)` ledger aggregates.
    ///
    /// Rows with an unrecognised entity type or status are ignored.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, S, i64)>,
        S: AsRef<str>,
    {
        let mut stats = Self::default();
        for (entity, status, count) in counts {
            let (Some(entity), Some(status)) = (
                EntityType::from_str(entity.as_ref()),
                ItemStatus::from_str(status.as_ref()),
            ) else {
                continue;
            };
            let n = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
            let slot = stats.entity_mut(entity);
            match status {
                ItemStatus::Imported => slot.imported += n,
                ItemStatus::Skipped => slot.skipped += n,
                ItemStatus::Error => slot.errors += n,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
