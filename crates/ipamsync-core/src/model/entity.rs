// ── Remote entity model ──
//
// Entities are what the address-management system hands out: typed nodes
// of the container tree with a flat property bag. The pager stamps the
// parent id on every entity it returns.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Placeholder for entities the remote system returns without a name.
pub const UNNAMED: &str = "UNNAMED";

/// Raw entity as returned by the remote API.
pub type RawEntity = ipamsync_api::bluecat::ApiEntity;

/// Opaque numeric identifier assigned by the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Object type names understood by the remote API.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum EntityType {
    #[strum(serialize = "Configuration")]
    #[serde(rename = "Configuration")]
    Configuration,
    #[strum(serialize = "IP4Block")]
    #[serde(rename = "IP4Block")]
    Ip4Block,
    #[strum(serialize = "IP6Block")]
    #[serde(rename = "IP6Block")]
    Ip6Block,
    #[strum(serialize = "IP4Network")]
    #[serde(rename = "IP4Network")]
    Ip4Network,
    #[strum(serialize = "IP6Network")]
    #[serde(rename = "IP6Network")]
    Ip6Network,
    #[strum(serialize = "IP4IPGroup")]
    #[serde(rename = "IP4IPGroup")]
    Ip4IpGroup,
    #[strum(serialize = "IP4Address")]
    #[serde(rename = "IP4Address")]
    Ip4Address,
    #[strum(serialize = "IP6Address")]
    #[serde(rename = "IP6Address")]
    Ip6Address,
    #[strum(serialize = "Zone")]
    #[serde(rename = "Zone")]
    Zone,
    #[strum(serialize = "HostRecord")]
    #[serde(rename = "HostRecord")]
    HostRecord,
}

/// Structural role of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Configuration,
    ContainerBlock,
    Network,
    Pool,
    Address,
    Zone,
    HostRecord,
}

impl EntityType {
    pub fn kind(self) -> EntityKind {
        match self {
            Self::Configuration => EntityKind::Configuration,
            Self::Ip4Block | Self::Ip6Block => EntityKind::ContainerBlock,
            Self::Ip4Network | Self::Ip6Network => EntityKind::Network,
            Self::Ip4IpGroup => EntityKind::Pool,
            Self::Ip4Address | Self::Ip6Address => EntityKind::Address,
            Self::Zone => EntityKind::Zone,
            Self::HostRecord => EntityKind::HostRecord,
        }
    }

    pub fn is_address(self) -> bool {
        self.kind() == EntityKind::Address
    }

    /// Property holding the prefix of a block, network or pool.
    pub fn prefix_property(self) -> &'static str {
        match self {
            Self::Ip6Block | Self::Ip6Network => "prefix",
            _ => "CIDR",
        }
    }
}

/// A node of the remote address tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Id of the container this entity was listed under.
    pub parent_id: Option<EntityId>,
}

impl Entity {
    /// Convert a raw API entity listed under `parent_id`.
    pub fn from_raw(raw: RawEntity, parent_id: EntityId) -> Result<Self, CoreError> {
        let type_name = raw.object_type.unwrap_or_default();
        let entity_type =
            EntityType::from_str(&type_name).map_err(|_| CoreError::SchemaMismatch {
                entity_id: EntityId(raw.id),
                object_type: type_name.clone(),
                reason: "unknown object type".into(),
            })?;

        Ok(Self {
            id: EntityId(raw.id),
            entity_type,
            name: raw.name.filter(|n| !n.is_empty()),
            properties: raw.properties,
            parent_id: Some(parent_id),
        })
    }

    /// Display name, `UNNAMED` when the remote system has none.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Address state (`STATIC`, `DHCP_RESERVED`, ...), addresses only.
    pub fn state(&self) -> Option<&str> {
        self.property("state")
    }

    fn schema_error(&self, reason: impl Into<String>) -> CoreError {
        CoreError::SchemaMismatch {
            entity_id: self.id,
            object_type: self.entity_type.to_string(),
            reason: reason.into(),
        }
    }

    /// Network of a block, network or pool.
    ///
    /// Range-defined objects (`start`/`end` instead of a prefix) cannot be
    /// expressed as a prefix and are rejected.
    pub fn network(&self) -> Result<IpNetwork, CoreError> {
        let key = self.entity_type.prefix_property();
        let Some(raw) = self.property(key) else {
            if self.property("start").is_some() || self.property("end").is_some() {
                return Err(self.schema_error("range-defined objects are not supported"));
            }
            return Err(self.schema_error(format!("missing {key:?} property")));
        };

        IpNetwork::from_str(raw)
            .map_err(|e| self.schema_error(format!("invalid prefix {raw:?}: {e}")))
    }

    /// Host address of an address entity.
    pub fn address(&self) -> Result<IpAddr, CoreError> {
        let raw = self
            .property("address")
            .ok_or_else(|| self.schema_error("missing \"address\" property"))?;
        IpAddr::from_str(raw).map_err(|e| self.schema_error(format!("invalid address {raw:?}: {e}")))
    }
}

/// A host address qualified with its parent network's prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AddressRange {
    pub address: IpAddr,
    pub prefix_len: u8,
}

impl AddressRange {
    /// Qualify `entity`'s address with the prefix length of `parent`.
    pub fn from_parent(entity: &Entity, parent: &IpNetwork) -> Result<Self, CoreError> {
        let address = entity.address()?;
        if address.is_ipv4() != parent.is_ipv4() {
            return Err(entity.schema_error(format!(
                "address family differs from parent network {parent}"
            )));
        }

        Ok(Self {
            address,
            prefix_len: parent.prefix(),
        })
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}
