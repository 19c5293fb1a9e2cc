// ── Changeset application ──
//
// Writes a reconciled changeset to a `TargetStore`. Creates run in
// parent-first order, then updates, then orphan handling. The whole run is
// bracketed by begin/commit; any failure rolls back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Changeset, RecordKey, Status, SyncRecord};
use crate::target::{FlagRequest, TagSpec, TargetStore};

/// What to do with target records that have no source counterpart.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Report only.
    Skip,
    /// Mark deprecated, tag and annotate; never delete.
    #[default]
    Flag,
    /// Hard delete. Requires explicit opt-in.
    Delete,
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub orphan_policy: OrphanPolicy,
    /// Opt-in required by [`OrphanPolicy::Delete`].
    pub allow_delete: bool,
    /// Job name written into audit notes.
    pub job_name: String,
    pub tag: TagSpec,
}

impl ApplyOptions {
    pub const DEFAULT_JOB_NAME: &'static str = "ipamsync";

    /// Reject option combinations that must never reach the target.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.orphan_policy == OrphanPolicy::Delete && !self.allow_delete {
            return Err(CoreError::OrphanPolicyViolation {
                message: "orphan policy `delete` requires allow_delete".into(),
            });
        }
        Ok(())
    }

    fn note_for(&self, key: &RecordKey) -> String {
        format!(
            "{}: {key} has been flagged for deletion by the {} job.",
            self.tag.name, self.job_name
        )
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            orphan_policy: OrphanPolicy::default(),
            allow_delete: false,
            job_name: Self::DEFAULT_JOB_NAME.into(),
            tag: TagSpec::safe_delete(),
        }
    }
}

/// Outcome of orphan handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub skipped: usize,
    pub flagged: usize,
    /// Orphans that already carried the tag and needed no write.
    pub already_flagged: usize,
    pub deleted: usize,
}

/// Outcome of a full apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub orphans: ApplyResult,
    /// Whether the store actually bracketed the writes in a transaction.
    pub transactional: bool,
}

/// Handle orphaned target records according to `policy`.
///
/// With [`OrphanPolicy::Flag`], a record that already carries the tag gets
/// neither a second tag nor a second note, so repeated runs converge.
pub async fn apply_orphan_policy<T: TargetStore>(
    store: &T,
    orphans: &BTreeMap<RecordKey, SyncRecord>,
    policy: OrphanPolicy,
    options: &ApplyOptions,
) -> Result<ApplyResult, CoreError> {
    if policy == OrphanPolicy::Delete && !options.allow_delete {
        return Err(CoreError::OrphanPolicyViolation {
            message: format!(
                "refusing to delete {} orphaned records without allow_delete",
                orphans.len()
            ),
        });
    }

    let mut result = ApplyResult::default();

    for (key, record) in orphans {
        if policy == OrphanPolicy::Skip {
            debug!(%key, "orphan left untouched");
            result.skipped += 1;
            continue;
        }

        let pk = record
            .target_pk
            .as_deref()
            .ok_or_else(|| CoreError::NotFound { key: key.clone() })?;

        match policy {
            OrphanPolicy::Delete => {
                store.delete(key.kind, pk).await?;
                warn!(%key, "deleted orphaned record");
                result.deleted += 1;
            }
            OrphanPolicy::Flag => {
                let state = store.audit_state(key.kind, pk).await?;
                let already_tagged = state.tags.contains(&options.tag.name);

                let request = FlagRequest {
                    set_status: (state.status != Status::Deprecated).then_some(Status::Deprecated),
                    add_tag: (!already_tagged).then(|| options.tag.clone()),
                    note: (!already_tagged).then(|| options.note_for(key)),
                };

                if request.is_noop() {
                    result.already_flagged += 1;
                    continue;
                }
                store.flag(key.kind, pk, &request).await?;
                if already_tagged {
                    result.already_flagged += 1;
                } else {
                    warn!(%key, "flagged orphaned record for deletion");
                    result.flagged += 1;
                }
            }
            OrphanPolicy::Skip => {}
        }
    }

    Ok(result)
}

/// Apply a whole changeset inside one store transaction.
///
/// Options are validated before the first write. On failure the store is
/// rolled back and the error reports how far the run got.
pub async fn apply_changeset<T: TargetStore>(
    store: &T,
    changeset: &Changeset,
    options: &ApplyOptions,
) -> Result<ApplyReport, CoreError> {
    options.validate()?;

    let mut report = ApplyReport {
        unchanged: changeset.unchanged.len(),
        transactional: store.supports_transactions(),
        ..ApplyReport::default()
    };

    store.begin().await?;
    match write_all(store, changeset, options, &mut report).await {
        Ok(()) => {
            store.commit().await?;
            info!(
                store = store.name(),
                created = report.created,
                updated = report.updated,
                flagged = report.orphans.flagged,
                deleted = report.orphans.deleted,
                "changeset applied"
            );
            Ok(report)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            Err(CoreError::ApplyFailed {
                created: report.created,
                updated: report.updated,
                source: Box::new(err),
            })
        }
    }
}

async fn write_all<T: TargetStore>(
    store: &T,
    changeset: &Changeset,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) -> Result<(), CoreError> {
    for record in changeset.creates_in_order() {
        let pk = store.create(record).await?;
        debug!(key = %record.key, pk, "created");
        report.created += 1;
    }

    for (key, update) in &changeset.update {
        let pk = update
            .target_pk
            .as_deref()
            .ok_or_else(|| CoreError::NotFound { key: key.clone() })?;
        store.update(pk, &update.record, &update.diff).await?;
        debug!(%key, fields = update.diff.len(), "updated");
        report.updated += 1;
    }

    report.orphans =
        apply_orphan_policy(store, &changeset.orphans, options.orphan_policy, options).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::reconcile::reconcile;
    use crate::testing::{MemoryTarget, prefix_record};

    fn orphan_map(target: &MemoryTarget) -> BTreeMap<RecordKey, SyncRecord> {
        target
            .records()
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect()
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("FLAG".parse::<OrphanPolicy>().unwrap(), OrphanPolicy::Flag);
        assert_eq!(OrphanPolicy::Delete.to_string(), "delete");
        assert_eq!(OrphanPolicy::default(), OrphanPolicy::Flag);
    }

    #[tokio::test]
    async fn flag_is_idempotent() {
        let target =
            MemoryTarget::with_records(vec![prefix_record("203.0.113.0/24", "old", Status::Active)]);
        let options = ApplyOptions::default();

        let first = apply_orphan_policy(&target, &orphan_map(&target), OrphanPolicy::Flag, &options)
            .await
            .unwrap();
        assert_eq!(first.flagged, 1);
        let writes_after_first = target.writes();

        let second =
            apply_orphan_policy(&target, &orphan_map(&target), OrphanPolicy::Flag, &options)
                .await
                .unwrap();
        assert_eq!(second.flagged, 0);
        assert_eq!(second.already_flagged, 1);
        assert_eq!(target.writes(), writes_after_first);

        let record = target.record("203.0.113.0/24").unwrap();
        assert_eq!(record.status, Status::Deprecated);
        assert!(record.tags.contains(TagSpec::SAFE_DELETE));

        let notes = target.notes(&target.pk_of("203.0.113.0/24"));
        assert_eq!(
            notes,
            vec!["SSoT Safe Delete: prefix 203.0.113.0/24 has been flagged for deletion by the ipamsync job.".to_owned()]
        );
    }

    #[tokio::test]
    async fn tagged_record_with_reverted_status_gets_status_only() {
        let mut record = prefix_record("203.0.113.0/24", "old", Status::Active);
        record.tags.insert(TagSpec::SAFE_DELETE.into());
        let target = MemoryTarget::with_records(vec![record]);

        let result = apply_orphan_policy(
            &target,
            &orphan_map(&target),
            OrphanPolicy::Flag,
            &ApplyOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.already_flagged, 1);
        assert_eq!(
            target.record("203.0.113.0/24").unwrap().status,
            Status::Deprecated
        );
        assert!(target.notes(&target.pk_of("203.0.113.0/24")).is_empty());
    }

    #[tokio::test]
    async fn delete_without_opt_in_writes_nothing() {
        let target =
            MemoryTarget::with_records(vec![prefix_record("203.0.113.0/24", "old", Status::Active)]);

        let err = apply_orphan_policy(
            &target,
            &orphan_map(&target),
            OrphanPolicy::Delete,
            &ApplyOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::OrphanPolicyViolation { .. }));
        assert_eq!(target.writes(), 0);
        assert_eq!(target.records().len(), 1);
    }

    #[tokio::test]
    async fn delete_with_opt_in_removes() {
        let target =
            MemoryTarget::with_records(vec![prefix_record("203.0.113.0/24", "old", Status::Active)]);
        let options = ApplyOptions {
            allow_delete: true,
            ..ApplyOptions::default()
        };

        let result = apply_orphan_policy(&target, &orphan_map(&target), OrphanPolicy::Delete, &options)
            .await
            .unwrap();

        assert_eq!(result.deleted, 1);
        assert!(target.records().is_empty());
    }

    #[tokio::test]
    async fn skip_reports_only() {
        let target =
            MemoryTarget::with_records(vec![prefix_record("203.0.113.0/24", "old", Status::Active)]);

        let result = apply_orphan_policy(
            &target,
            &orphan_map(&target),
            OrphanPolicy::Skip,
            &ApplyOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.skipped, 1);
        assert_eq!(target.writes(), 0);
    }

    #[tokio::test]
    async fn changeset_delete_policy_is_validated_before_writes() {
        let target = MemoryTarget::new();
        let changeset = reconcile(
            vec![prefix_record("10.0.0.0/24", "new", Status::Active)],
            Vec::new(),
        );
        let options = ApplyOptions {
            orphan_policy: OrphanPolicy::Delete,
            ..ApplyOptions::default()
        };

        let err = apply_changeset(&target, &changeset, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OrphanPolicyViolation { .. }));
        assert_eq!(target.writes(), 0);
    }

    #[tokio::test]
    async fn applies_creates_updates_and_orphans() {
        let target = MemoryTarget::with_records(vec![
            prefix_record("192.0.2.0/25", "lab", Status::Reserved),
            prefix_record("203.0.113.0/24", "old", Status::Active),
        ]);
        let source = vec![
            prefix_record("192.0.2.0/25", "lab", Status::Active),
            prefix_record("198.51.100.0/24", "dmz", Status::Active),
        ];
        let changeset = reconcile(source, target.records());

        let report = apply_changeset(&target, &changeset, &ApplyOptions::default())
            .await
            .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.orphans.flagged, 1);
        assert!(report.transactional);
        assert_eq!(target.record("192.0.2.0/25").unwrap().status, Status::Active);
        assert!(target.record("198.51.100.0/24").is_some());
    }

    #[tokio::test]
    async fn failure_rolls_back() {
        let target = MemoryTarget::with_records(vec![prefix_record(
            "192.0.2.0/25",
            "lab",
            Status::Reserved,
        )])
        .failing_after(1);
        let source = vec![
            prefix_record("10.0.0.0/8", "ten", Status::Container),
            prefix_record("10.1.0.0/16", "ten-one", Status::Active),
            prefix_record("192.0.2.0/25", "lab", Status::Active),
        ];
        let changeset = reconcile(source, target.records());

        let err = apply_changeset(&target, &changeset, &ApplyOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::ApplyFailed {
                created: 1,
                updated: 0,
                ..
            }
        ));
        let records = target.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Status::Reserved);
    }
}
