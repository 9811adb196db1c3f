//! Pure translation from source records to target creation payloads.
//!
//! Nothing here touches the network or the database. A contact maps to one
//! [`CreateContact`]; a job fans out into a [`CreateProperty`], a
//! [`CreateLead`] and a [`CreateWorkOrder`].

use serde::Deserialize;
use serde_json::Value;

use tradeflow_core::currency::to_minor_units;
use tradeflow_core::migration::{
    placeholder_external_id, EXTERNAL_SOURCE, PLACEHOLDER_FIRST_NAME, PLACEHOLDER_LAST_NAME,
};
use tradeflow_core::naming::contact_slug;
use tradeflow_core::status_rules::{lead_position, work_order_status, work_type};
use tradeflow_core::types::DbId;
use tradeflow_db::models::contact::CreateContact;
use tradeflow_db::models::lead::CreateLead;
use tradeflow_db::models::property::CreateProperty;
use tradeflow_db::models::work_order::CreateWorkOrder;

use crate::external::{ExternalContact, ExternalJob};

/// Stored when the source has no given or family name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Title used for leads and work orders whose job has no name.
pub const UNTITLED_JOB: &str = "Untitled Job";

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Record decoding
// ---------------------------------------------------------------------------

/// Ledger id for a raw record: its `id` when present, else its 1-based
/// position in the fetched batch (`#3`).
pub fn record_external_id(record: &Value, index: usize) -> String {
    let id = match record.get("id") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        format!("#{}", index + 1)
    } else {
        id
    }
}

pub fn parse_contact(record: &Value) -> Result<ExternalContact, MappingError> {
    let contact = ExternalContact::deserialize(record)?;
    if contact.id.is_empty() {
        return Err(MappingError::MissingField("id"));
    }
    Ok(contact)
}

pub fn parse_job(record: &Value) -> Result<ExternalJob, MappingError> {
    let job = ExternalJob::deserialize(record)?;
    if job.id.is_empty() {
        return Err(MappingError::MissingField("id"));
    }
    Ok(job)
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

pub fn map_contact(org_id: DbId, contact: &ExternalContact) -> CreateContact {
    let first_name = non_blank(contact.first_name.as_deref()).unwrap_or(UNKNOWN_NAME);
    let last_name = non_blank(contact.last_name.as_deref()).unwrap_or(UNKNOWN_NAME);
    let address = contact.address.clone().unwrap_or_default();

    CreateContact {
        org_id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: non_blank(contact.email.as_deref()).map(str::to_lowercase),
        phone: owned(contact.phone.as_deref()),
        address_line1: owned(address.line1.as_deref()),
        address_line2: owned(address.line2.as_deref()),
        city: owned(address.city.as_deref()),
        state: owned(address.state.as_deref()),
        postal_code: owned(address.postal_code.as_deref()),
        country: owned(address.country.as_deref()),
        slug: contact_slug(first_name, last_name, &contact.id),
        is_placeholder: false,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: contact.id.clone(),
    }
}

/// The per-organization stand-in for jobs whose contact cannot be resolved.
pub fn placeholder_contact(org_id: DbId) -> CreateContact {
    let external_id = placeholder_external_id(org_id);
    CreateContact {
        org_id,
        first_name: PLACEHOLDER_FIRST_NAME.to_string(),
        last_name: PLACEHOLDER_LAST_NAME.to_string(),
        email: None,
        phone: None,
        address_line1: None,
        address_line2: None,
        city: None,
        state: None,
        postal_code: None,
        country: None,
        slug: contact_slug(PLACEHOLDER_FIRST_NAME, PLACEHOLDER_LAST_NAME, &external_id),
        is_placeholder: true,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id,
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// The service location of a job. Named after its street address, falling
/// back to the job name.
pub fn map_property(org_id: DbId, job: &ExternalJob) -> CreateProperty {
    let address = job.address.clone().unwrap_or_default();
    let name = address
        .street()
        .or_else(|| non_blank(job.name.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Property {}", job.id));

    CreateProperty {
        org_id,
        name,
        address_line1: owned(address.line1.as_deref()),
        address_line2: owned(address.line2.as_deref()),
        city: owned(address.city.as_deref()),
        state: owned(address.state.as_deref()),
        postal_code: owned(address.postal_code.as_deref()),
        country: owned(address.country.as_deref()),
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: job.id.clone(),
    }
}

pub fn map_lead(
    org_id: DbId,
    job: &ExternalJob,
    contact_id: DbId,
    property_id: Option<DbId>,
) -> Result<CreateLead, MappingError> {
    let position = lead_position(job.status.as_deref());
    Ok(CreateLead {
        org_id,
        contact_id,
        property_id,
        title: job_title(job),
        description: owned(job.description.as_deref()),
        stage: position.stage.as_str().to_string(),
        temperature: position.temperature.as_str().to_string(),
        estimated_value_cents: estimated_cents(job)?,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: job.id.clone(),
    })
}

pub fn map_work_order(
    org_id: DbId,
    job: &ExternalJob,
    contact_id: DbId,
    property_id: DbId,
) -> Result<CreateWorkOrder, MappingError> {
    Ok(CreateWorkOrder {
        org_id,
        contact_id,
        property_id,
        title: job_title(job),
        description: owned(job.description.as_deref()),
        status: work_order_status(job.status.as_deref()).as_str().to_string(),
        work_type: work_type(job.job_type.as_deref(), job.name.as_deref())
            .as_str()
            .to_string(),
        estimated_value_cents: estimated_cents(job)?,
        external_source: EXTERNAL_SOURCE.to_string(),
        external_id: job.id.clone(),
    })
}

// ---- helpers ----

fn job_title(job: &ExternalJob) -> String {
    non_blank(job.name.as_deref())
        .unwrap_or(UNTITLED_JOB)
        .to_string()
}

fn estimated_cents(job: &ExternalJob) -> Result<Option<i64>, MappingError> {
    to_minor_units(job.estimated_value).map_err(|e| MappingError::InvalidValue {
        field: "estimatedValue",
        reason: e.to_string(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
