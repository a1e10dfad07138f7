use axum::body::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Payload of a single analytics event.
///
/// Every field is optional on the wire; missing or `null` strings decode as
/// empty and a missing `data` decodes as `None` (serialized back as `null`).
/// Keys also match in TitleCase. Unknown top-level fields are dropped.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EventBody {
    #[serde(default, alias = "Module", deserialize_with = "null_as_empty")]
    pub module: String,
    #[serde(
        default,
        rename = "type",
        alias = "Type",
        deserialize_with = "null_as_empty"
    )]
    pub event_type: String,
    #[serde(default, alias = "Event", deserialize_with = "null_as_empty")]
    pub event: String,
    #[serde(default, alias = "Name", deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, alias = "Data")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl EventBody {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Frozen snapshot of an accepted request, owned by the intake queue until a
/// worker claims it.
#[derive(Debug, Clone)]
pub struct RawIntakeItem {
    pub body: Bytes,
    pub user_id: String,
    pub user_agent: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

/// JSON document stored in the `data` column.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsDocument {
    /// Identifying header values keyed by their configured header names.
    pub headers: BTreeMap<String, String>,
    pub body: EventBody,
}

/// Unit handed to the persistence writer. The row timestamp is taken at
/// write time, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub user_id: String,
    pub document: AnalyticsDocument,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct StatsResponse {
    pub accepted: u64,
    pub rejected: u64,
    pub queue_full: u64,
    pub parse_failures: u64,
    pub writes_ok: u64,
    pub write_failures: u64,
    pub queue_depth: usize,
}
