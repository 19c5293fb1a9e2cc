// ── Nautobot target adapter ──
//
// `TargetStore` over the Nautobot REST API. Prefixes and IP addresses map
// onto `SyncRecord`s keyed by their canonical CIDR text. Nautobot has no
// client-side transactions, so begin/commit/rollback stay no-ops.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ipnetwork::IpNetwork;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use ipamsync_api::nautobot::{
    self, IdRef, IpAddress, IpAddressWrite, NameRef, NestedRef, Prefix, PrefixWrite, TagWrite,
};
use ipamsync_api::NautobotClient;

use crate::config::TargetConfig;
use crate::convert::{canonical_prefix, parse_target_status};
use crate::error::CoreError;
use crate::model::{FieldDiff, RecordKey, RecordKind, SyncRecord, attr};
use crate::target::{AuditState, FlagRequest, TagSpec, TargetStore};

/// Custom field holding the Bluecat entity id of synced objects.
pub const SOURCE_ID_FIELD: &str = "bluecat_id";

const DEFAULT_NAMESPACE: &str = "Global";

const TAG_CONTENT_TYPES: &[&str] = &["ipam.prefix", "ipam.ipaddress"];

pub struct NautobotStore {
    client: NautobotClient,
    page_size: u32,
    /// Tag name → id, filled on first use.
    tags: Mutex<HashMap<String, Uuid>>,
}

impl NautobotStore {
    pub fn new(client: NautobotClient, page_size: u32) -> Self {
        Self {
            client,
            page_size,
            tags: Mutex::new(HashMap::new()),
        }
    }

    pub fn connect(config: &TargetConfig) -> Result<Self, CoreError> {
        let transport = config.tls.transport(config.timeout);
        let client = NautobotClient::from_token(config.url.as_str(), &config.token, &transport)?;
        Ok(Self::new(client, config.page_size))
    }

    async fn tag_id(&self, spec: &TagSpec) -> Result<Uuid, CoreError> {
        let mut tags = self.tags.lock().await;
        if let Some(id) = tags.get(&spec.name) {
            return Ok(*id);
        }

        let tag = self
            .client
            .ensure_tag(&TagWrite {
                name: spec.name.clone(),
                color: spec.color.clone(),
                description: spec.description.clone(),
                content_types: TAG_CONTENT_TYPES.iter().map(|&t| t.to_owned()).collect(),
            })
            .await?;
        tags.insert(spec.name.clone(), tag.id);
        Ok(tag.id)
    }

    /// Status name and tag refs of one object, as currently stored.
    async fn current(
        &self,
        kind: RecordKind,
        id: &Uuid,
    ) -> Result<(Option<String>, Vec<NestedRef>), CoreError> {
        Ok(match kind {
            RecordKind::Prefix => {
                let prefix = self.client.get_prefix(id).await?;
                (prefix.status.name, prefix.tags)
            }
            RecordKind::Address => {
                let address = self.client.get_ip_address(id).await?;
                (address.status.name, address.tags)
            }
        })
    }
}

fn parse_pk(pk: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(pk).map_err(|e| CoreError::Internal(format!("invalid target pk {pk:?}: {e}")))
}

fn resource(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Prefix => nautobot::PREFIXES,
        RecordKind::Address => nautobot::IP_ADDRESSES,
    }
}

fn canonical_key(kind: RecordKind, value: &str) -> Result<RecordKey, CoreError> {
    let network: IpNetwork = value
        .parse()
        .map_err(|e| CoreError::Internal(format!("target {kind} {value:?} is not CIDR: {e}")))?;
    match kind {
        RecordKind::Prefix => Ok(RecordKey::prefix(&canonical_prefix(network)?)),
        // Addresses keep their host bits.
        RecordKind::Address => Ok(RecordKey::address(&network.to_string())),
    }
}

fn status_name(status: &NestedRef, context: &str) -> Result<String, CoreError> {
    status.name.clone().ok_or_else(|| CoreError::UnmappedStatus {
        value: status.id.to_string(),
        context: context.to_owned(),
    })
}

fn source_id(custom_fields: &Map<String, Value>) -> Option<String> {
    match custom_fields.get(SOURCE_ID_FIELD)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn tag_names(tags: &[NestedRef]) -> BTreeSet<String> {
    tags.iter().filter_map(|t| t.name.clone()).collect()
}

fn source_id_field(record: &SyncRecord) -> Option<Map<String, Value>> {
    let id = record.source_id.as_deref()?;
    let value = id
        .parse::<u64>()
        .map_or_else(|_| Value::String(id.to_owned()), Value::from);
    Some(Map::from_iter([(SOURCE_ID_FIELD.to_owned(), value)]))
}

/// `None` for prefixes without a source id; those are not ours to manage.
fn prefix_to_record(prefix: Prefix) -> Result<Option<SyncRecord>, CoreError> {
    let Some(source_id) = source_id(&prefix.custom_fields) else {
        warn!(prefix = %prefix.prefix, "prefix has no {SOURCE_ID_FIELD}, skipping");
        return Ok(None);
    };
    let key = canonical_key(RecordKind::Prefix, &prefix.prefix)?;
    let context = format!("prefix {}", prefix.prefix);
    let status = parse_target_status(&status_name(&prefix.status, &context)?, &context)?;

    let mut record = SyncRecord::new(key, prefix.description, status);
    if let Some(choice) = prefix.prefix_type {
        record = record.with_attribute(attr::TYPE, choice.value);
    }
    record.source_id = Some(source_id);
    record.target_pk = Some(prefix.id.to_string());
    record.tags = tag_names(&prefix.tags);
    Ok(Some(record))
}

fn address_to_record(address: IpAddress) -> Result<Option<SyncRecord>, CoreError> {
    let Some(source_id) = source_id(&address.custom_fields) else {
        warn!(address = %address.address, "ip address has no {SOURCE_ID_FIELD}, skipping");
        return Ok(None);
    };
    let key = canonical_key(RecordKind::Address, &address.address)?;
    let context = format!("ip address {}", address.address);
    let status = parse_target_status(&status_name(&address.status, &context)?, &context)?;

    let mut record = SyncRecord::new(key, address.description, status);
    if let Some(choice) = address.address_type {
        record = record.with_attribute(attr::TYPE, choice.value);
    }
    record.source_id = Some(source_id);
    record.target_pk = Some(address.id.to_string());
    record.tags = tag_names(&address.tags);
    Ok(Some(record))
}

/// Values of the diffed fields, taken from `record`.
struct Changed {
    description: Option<String>,
    status: Option<NameRef>,
    kind_type: Option<String>,
}

impl Changed {
    fn from_diff(record: &SyncRecord, diff: &FieldDiff) -> Self {
        Self {
            description: diff
                .contains("description")
                .then(|| record.description.clone()),
            status: diff
                .contains("status")
                .then(|| NameRef::new(record.status.to_string())),
            kind_type: diff
                .contains(attr::TYPE)
                .then(|| record.attribute(attr::TYPE).unwrap_or_default().to_owned()),
        }
    }
}

impl TargetStore for NautobotStore {
    fn name(&self) -> &str {
        "nautobot"
    }

    async fn list_all(&self, kind: RecordKind) -> Result<Vec<SyncRecord>, CoreError> {
        let records = match kind {
            RecordKind::Prefix => self
                .client
                .all_prefixes(self.page_size)
                .await?
                .into_iter()
                .map(prefix_to_record)
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>, _>>()?,
            RecordKind::Address => self
                .client
                .all_ip_addresses(self.page_size)
                .await?
                .into_iter()
                .map(address_to_record)
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>, _>>()?,
        };
        debug!(%kind, count = records.len(), "loaded target records");
        Ok(records)
    }

    async fn create(&self, record: &SyncRecord) -> Result<String, CoreError> {
        let status = Some(NameRef::new(record.status.to_string()));
        let kind_type = record.attribute(attr::TYPE).map(str::to_owned);

        let id = match record.key.kind {
            RecordKind::Prefix => {
                let body = PrefixWrite {
                    prefix: Some(record.key.value.clone()),
                    description: Some(record.description.clone()),
                    status,
                    prefix_type: kind_type,
                    custom_fields: source_id_field(record),
                    ..PrefixWrite::default()
                };
                self.client.create_prefix(&body).await?.id
            }
            RecordKind::Address => {
                let body = IpAddressWrite {
                    address: Some(record.key.value.clone()),
                    namespace: Some(NameRef::new(DEFAULT_NAMESPACE)),
                    description: Some(record.description.clone()),
                    status,
                    address_type: kind_type,
                    custom_fields: source_id_field(record),
                    ..IpAddressWrite::default()
                };
                self.client.create_ip_address(&body).await?.id
            }
        };
        Ok(id.to_string())
    }

    async fn update(
        &self,
        target_pk: &str,
        record: &SyncRecord,
        diff: &FieldDiff,
    ) -> Result<(), CoreError> {
        let id = parse_pk(target_pk)?;
        let changed = Changed::from_diff(record, diff);

        match record.key.kind {
            RecordKind::Prefix => {
                let body = PrefixWrite {
                    description: changed.description,
                    status: changed.status,
                    prefix_type: changed.kind_type,
                    ..PrefixWrite::default()
                };
                self.client.update_prefix(&id, &body).await?;
            }
            RecordKind::Address => {
                let body = IpAddressWrite {
                    description: changed.description,
                    status: changed.status,
                    address_type: changed.kind_type,
                    ..IpAddressWrite::default()
                };
                self.client.update_ip_address(&id, &body).await?;
            }
        }
        Ok(())
    }

    async fn audit_state(&self, kind: RecordKind, target_pk: &str) -> Result<AuditState, CoreError> {
        let id = parse_pk(target_pk)?;
        let (status, tags) = self.current(kind, &id).await?;
        let context = format!("{kind} {target_pk}");
        let status = status.ok_or_else(|| CoreError::UnmappedStatus {
            value: String::new(),
            context: context.clone(),
        })?;

        Ok(AuditState {
            status: parse_target_status(&status, &context)?,
            tags: tag_names(&tags),
        })
    }

    async fn flag(
        &self,
        kind: RecordKind,
        target_pk: &str,
        request: &FlagRequest,
    ) -> Result<(), CoreError> {
        if request.is_noop() {
            return Ok(());
        }
        let id = parse_pk(target_pk)?;
        let status = request.set_status.map(|s| NameRef::new(s.to_string()));

        let tags = match request.add_tag {
            Some(ref spec) => {
                let tag_id = self.tag_id(spec).await?;
                let (_, current) = self.current(kind, &id).await?;
                // PATCH replaces the whole tag list.
                let mut ids: BTreeMap<Uuid, IdRef> =
                    current.iter().map(|t| (t.id, IdRef { id: t.id })).collect();
                ids.insert(tag_id, IdRef { id: tag_id });
                Some(ids.into_values().collect())
            }
            None => None,
        };

        if status.is_some() || tags.is_some() {
            match kind {
                RecordKind::Prefix => {
                    let body = PrefixWrite {
                        status,
                        tags,
                        ..PrefixWrite::default()
                    };
                    self.client.update_prefix(&id, &body).await?;
                }
                RecordKind::Address => {
                    let body = IpAddressWrite {
                        status,
                        tags,
                        ..IpAddressWrite::default()
                    };
                    self.client.update_ip_address(&id, &body).await?;
                }
            }
        }

        if let Some(ref note) = request.note {
            self.client.add_note(resource(kind), &id, note).await?;
        }
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, target_pk: &str) -> Result<(), CoreError> {
        let id = parse_pk(target_pk)?;
        match kind {
            RecordKind::Prefix => self.client.delete_prefix(&id).await?,
            RecordKind::Address => self.client.delete_ip_address(&id).await?,
        }
        Ok(())
    }
}
