// ── Reconciliation output ──

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::record::{RecordKey, RecordKind, SyncRecord};

/// Old and new value of one compared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Field name → change, for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldDiff(pub BTreeMap<String, FieldChange>);

impl FieldDiff {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn record(&mut self, field: &str, from: Option<&str>, to: Option<&str>) {
        if from != to {
            self.0.insert(
                field.to_owned(),
                FieldChange {
                    from: from.map(str::to_owned),
                    to: to.map(str::to_owned),
                },
            );
        }
    }
}

/// A record present on both sides whose compared fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordUpdate {
    /// Desired state, taken from the source.
    pub record: SyncRecord,
    /// Primary key of the existing target record.
    pub target_pk: Option<String>,
    pub diff: FieldDiff,
}

/// Outcome of reconciling a source snapshot against a target snapshot.
///
/// Every key lands in exactly one of the four collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changeset {
    pub create: BTreeMap<RecordKey, SyncRecord>,
    pub update: BTreeMap<RecordKey, RecordUpdate>,
    /// Target records with no source counterpart, keyed like the rest.
    pub orphans: BTreeMap<RecordKey, SyncRecord>,
    pub unchanged: BTreeSet<RecordKey>,
}

impl Changeset {
    /// `true` when there is nothing to create, update or treat as an orphan.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.orphans.is_empty()
    }

    /// Total number of distinct keys across all collections.
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.orphans.len() + self.unchanged.len()
    }

    /// Creates ordered so parents precede children: prefixes by ascending
    /// prefix length, then addresses.
    pub fn creates_in_order(&self) -> Vec<&SyncRecord> {
        let mut records: Vec<&SyncRecord> = self.create.values().collect();
        records.sort_by(|a, b| create_order(a).cmp(&create_order(b)));
        records
    }
}

fn create_order(record: &SyncRecord) -> (bool, u8, &RecordKey) {
    (
        record.key.kind != RecordKind::Prefix,
        record.key.prefix_len().unwrap_or(u8::MAX),
        &record.key,
    )
}
