// Nautobot REST wire types (API version 2.x, `depth=1` responses)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Nested reference to a related object (status, tag, namespace).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NestedRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

/// Choice field (`{"value": "network", "label": "Network"}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prefix {
    pub id: Uuid,
    pub prefix: String,
    #[serde(default)]
    pub description: String,
    pub status: NestedRef,
    #[serde(rename = "type", default)]
    pub prefix_type: Option<Choice>,
    #[serde(default)]
    pub tags: Vec<NestedRef>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpAddress {
    pub id: Uuid,
    pub address: String,
    #[serde(default)]
    pub description: String,
    pub status: NestedRef,
    #[serde(rename = "type", default)]
    pub address_type: Option<Choice>,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub tags: Vec<NestedRef>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub note: String,
}

// ── Request bodies ───────────────────────────────────────────────────

/// Reference by natural key, e.g. `{"name": "Active"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRef {
    pub id: Uuid,
}

/// Create/patch body for `/ipam/prefixes/`. Unset fields are omitted,
/// so the same type serves full creates and partial updates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrefixWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NameRef>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub prefix_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Map<String, Value>>,
}

/// Create/patch body for `/ipam/ip-addresses/`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IpAddressWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Required on create when no parent prefix is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NameRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NameRef>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWrite {
    pub name: String,
    pub color: String,
    pub description: String,
    pub content_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteWrite {
    pub note: String,
}
