// ── Reconciliation engine ──
//
// Pure function of two record sets. Each key ends up in exactly one of
// create / update / orphans / unchanged.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::model::{Changeset, FieldDiff, RecordKey, RecordUpdate, SyncRecord};

/// Compare `source` (desired state) against `target` (current state).
///
/// Compared fields are `description`, `status` and every attribute present
/// on either side. Duplicate keys within one input keep their first record.
pub fn reconcile(source: Vec<SyncRecord>, target: Vec<SyncRecord>) -> Changeset {
    let source = index("source", source);
    let mut target = index("target", target);
    let mut changeset = Changeset::default();

    for (key, desired) in source {
        match target.remove(&key) {
            None => {
                changeset.create.insert(key, desired);
            }
            Some(current) => {
                let diff = diff_records(&current, &desired);
                if diff.is_empty() {
                    changeset.unchanged.insert(key);
                } else {
                    changeset.update.insert(
                        key,
                        RecordUpdate {
                            record: desired,
                            target_pk: current.target_pk,
                            diff,
                        },
                    );
                }
            }
        }
    }

    changeset.orphans = target;

    debug!(
        create = changeset.create.len(),
        update = changeset.update.len(),
        orphans = changeset.orphans.len(),
        unchanged = changeset.unchanged.len(),
        "reconciled"
    );
    changeset
}

/// Field-level difference turning `current` into `desired`.
pub fn diff_records(current: &SyncRecord, desired: &SyncRecord) -> FieldDiff {
    let mut diff = FieldDiff::default();
    diff.record(
        "description",
        Some(current.description.as_str()),
        Some(desired.description.as_str()),
    );

    let current_status = current.status.to_string();
    let desired_status = desired.status.to_string();
    diff.record(
        "status",
        Some(current_status.as_str()),
        Some(desired_status.as_str()),
    );

    let names: BTreeSet<&String> = current
        .attributes
        .keys()
        .chain(desired.attributes.keys())
        .collect();
    for name in names {
        diff.record(name, current.attribute(name), desired.attribute(name));
    }

    diff
}

fn index(side: &str, records: Vec<SyncRecord>) -> BTreeMap<RecordKey, SyncRecord> {
    let mut indexed = BTreeMap::new();
    for record in records {
        match indexed.entry(record.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => {
                warn!(side, key = %record.key, "duplicate key, keeping first record");
            }
        }
    }
    indexed
}
