//! Record shapes returned by the source CRM's list endpoints.
//!
//! These are read-only views of the foreign schema. Field names follow the
//! source's camelCase JSON, with aliases for the spellings it has been seen
//! to use for addresses.

use serde::{Deserialize, Deserializer};

/// A person record from `GET /contacts`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalContact {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<ExternalAddress>,
}

/// A job record from `GET /jobs`.
///
/// One of these conflates a service location, a sales opportunity and the
/// execution of the work.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalJob {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    /// Decimal major currency units.
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub address: Option<ExternalAddress>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub contact_id: Option<String>,
}

/// Nested postal address.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAddress {
    #[serde(default, alias = "street", alias = "address1")]
    pub line1: Option<String>,
    #[serde(default, alias = "address2")]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "province")]
    pub state: Option<String>,
    #[serde(default, alias = "zip", alias = "postcode")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ExternalAddress {
    /// Single-line rendering of the street part, if any.
    pub fn street(&self) -> Option<&str> {
        self.line1.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Id deserializers
// ---------------------------------------------------------------------------

/// The source sends ids as strings on some endpoints and integers on others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(RawId::into_string)
}

fn optional_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(RawId::into_string)
        .filter(|s| !s.is_empty()))
}
