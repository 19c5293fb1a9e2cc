// ── Entity → SyncRecord normalization ──
//
// Blocks, networks and pools become prefix records; addresses become
// address records qualified with their parent network's prefix length.
// Every status string goes through a closed table; anything outside it is
// an error rather than a guess.

use std::collections::HashMap;

use ipnetwork::IpNetwork;
use tracing::debug;

use crate::error::CoreError;
use crate::fetch::Snapshot;
use crate::model::{
    AddressRange, Entity, EntityId, EntityKind, RecordKey, Status, SyncRecord, attr,
};

const RESERVED_KEYWORDS: &[&str] = &["reserve", "tbd", "do-not-use", "cannot-use", "avoid this"];

const DEPRECATED_KEYWORDS: &[&str] = &[
    "to-be-moved",
    "remove",
    "deprecated",
    "old-",
    "unused",
    "replaced",
    "decommissioned",
    "legacy",
    "reclaimed",
];

/// Map a Bluecat address `state` onto a status.
pub fn map_address_state(state: &str) -> Result<Status, CoreError> {
    match state {
        "STATIC" | "GATEWAY" => Ok(Status::Active),
        "RESERVED" | "RESTRICTED" | "UNASSIGNED" | "UNALLOCATED" => Ok(Status::Reserved),
        "DHCP_RESERVED" | "DHCP_ALLOCATED" | "DHCP_FREE" | "DHCP_LEASED" | "DHCP_ABANDONED"
        | "DHCP_EXCLUDED" | "DHCP_UNASSIGNED" => Ok(Status::Dhcp),
        other => Err(CoreError::UnmappedStatus {
            value: other.to_owned(),
            context: "address state".into(),
        }),
    }
}

/// Parse a target-side status name (case-insensitive).
pub fn parse_target_status(name: &str, context: &str) -> Result<Status, CoreError> {
    name.parse().map_err(|_| CoreError::UnmappedStatus {
        value: name.to_owned(),
        context: context.to_owned(),
    })
}

/// Guess a network's lifecycle status from the words in its name.
pub fn infer_status_from_name(name: &str) -> Status {
    let lower = name.to_lowercase();
    if RESERVED_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Status::Reserved
    } else if DEPRECATED_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Status::Deprecated
    } else {
        Status::Active
    }
}

/// Canonical text form of a prefix: host bits cleared, lowercase.
pub fn canonical_prefix(network: IpNetwork) -> Result<String, CoreError> {
    let canonical = IpNetwork::new(network.network(), network.prefix())
        .map_err(|e| CoreError::Internal(format!("cannot canonicalize {network}: {e}")))?;
    Ok(canonical.to_string().to_lowercase())
}

/// Normalize a fetched snapshot into source-side records.
pub fn normalize(snapshot: &Snapshot) -> Result<Vec<SyncRecord>, CoreError> {
    let mut networks: HashMap<EntityId, IpNetwork> = HashMap::new();
    let mut records = Vec::with_capacity(snapshot.entities.len());

    for entity in &snapshot.entities {
        if matches!(
            entity.entity_type.kind(),
            EntityKind::ContainerBlock | EntityKind::Network | EntityKind::Pool
        ) {
            let network = entity.network()?;
            networks.insert(entity.id, network);
            records.push(prefix_record(entity, network)?);
        }
    }

    for entity in &snapshot.entities {
        if entity.entity_type.kind() != EntityKind::Address {
            continue;
        }
        if let Some(record) = address_record(entity, &networks)? {
            records.push(record);
        }
    }

    debug!(records = records.len(), "normalized snapshot");
    Ok(records)
}

fn prefix_record(entity: &Entity, network: IpNetwork) -> Result<SyncRecord, CoreError> {
    let (status, prefix_type) = match entity.entity_type.kind() {
        EntityKind::ContainerBlock => (Status::Container, "container"),
        EntityKind::Pool => (infer_status_from_name(entity.name()), "pool"),
        _ => (infer_status_from_name(entity.name()), "network"),
    };

    let mut record = SyncRecord::new(
        RecordKey::prefix(&canonical_prefix(network)?),
        entity.name(),
        status,
    )
    .with_attribute(attr::TYPE, prefix_type);
    record.source_id = Some(entity.id.to_string());
    Ok(record)
}

fn address_record(
    entity: &Entity,
    networks: &HashMap<EntityId, IpNetwork>,
) -> Result<Option<SyncRecord>, CoreError> {
    let state = entity.state().ok_or_else(|| CoreError::SchemaMismatch {
        entity_id: entity.id,
        object_type: entity.entity_type.to_string(),
        reason: "missing \"state\" property".into(),
    })?;

    // Bluecat materializes an unnamed gateway entry in every network.
    if state == "GATEWAY" && entity.name.is_none() {
        return Ok(None);
    }

    let status = map_address_state(state)?;
    let parent = entity
        .parent_id
        .and_then(|id| networks.get(&id))
        .ok_or_else(|| CoreError::SchemaMismatch {
            entity_id: entity.id,
            object_type: entity.entity_type.to_string(),
            reason: "parent network is not part of the snapshot".into(),
        })?;
    let range = AddressRange::from_parent(entity, parent)?;

    let address_type = if status == Status::Dhcp { "dhcp" } else { "host" };
    let mut record = SyncRecord::new(
        RecordKey::address(&range.to_string()),
        entity.name.as_deref().unwrap_or_default(),
        status,
    )
    .with_attribute(attr::TYPE, address_type);
    record.source_id = Some(entity.id.to_string());
    Ok(Some(record))
}
