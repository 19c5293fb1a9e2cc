// ── Normalized sync records ──
//
// Both sides of a sync are reduced to `SyncRecord`s keyed by their natural
// key (the prefix or address in CIDR notation, lowercased).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which collection a record belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Prefix,
    Address,
}

/// Natural key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub value: String,
}

impl RecordKey {
    pub fn new(kind: RecordKind, value: &str) -> Self {
        Self {
            kind,
            value: value.trim().to_lowercase(),
        }
    }

    pub fn prefix(value: &str) -> Self {
        Self::new(RecordKind::Prefix, value)
    }

    pub fn address(value: &str) -> Self {
        Self::new(RecordKind::Address, value)
    }

    /// Prefix length encoded in the key, if any.
    pub fn prefix_len(&self) -> Option<u8> {
        self.value
            .rsplit_once('/')
            .and_then(|(_, len)| len.parse().ok())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.value)
    }
}

/// Lifecycle status shared by both sides.
///
/// Parsing is case-insensitive so target status names (`"Active"`,
/// `"DHCP"`) map onto the same variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Status {
    Active,
    Reserved,
    Deprecated,
    Container,
    #[strum(serialize = "DHCP")]
    #[serde(rename = "DHCP")]
    Dhcp,
}

/// Attribute names carried in `SyncRecord::attributes`.
pub mod attr {
    /// Prefix type (`container`, `network`, `pool`) or address type (`host`, `dhcp`).
    pub const TYPE: &str = "type";
}

/// One normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub key: RecordKey,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Id of the entity this record came from on the source side.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Primary key on the target side.
    #[serde(default)]
    pub target_pk: Option<String>,
    /// Target-side tags; never compared.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl SyncRecord {
    pub fn new(key: RecordKey, description: impl Into<String>, status: Status) -> Self {
        Self {
            key,
            description: description.into(),
            status,
            attributes: BTreeMap::new(),
            source_id: None,
            target_pk: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_owned(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
