// ── Target store seam ──
//
// The persistence side of a sync. Implementations translate records into
// their own API; the apply layer only ever talks to this trait.

use std::collections::BTreeSet;
use std::future::Future;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{FieldDiff, RecordKind, Status, SyncRecord};

/// Tag attached to records flagged by safe delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSpec {
    pub name: String,
    pub description: String,
    /// Hex color without `#`.
    pub color: String,
}

impl TagSpec {
    pub const SAFE_DELETE: &'static str = "SSoT Safe Delete";

    pub fn safe_delete() -> Self {
        Self {
            name: Self::SAFE_DELETE.into(),
            description: "Safe Delete Mode tag to flag an object, but not delete from the target."
                .into(),
            color: "f44336".into(),
        }
    }
}

/// Current audit-relevant state of one target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditState {
    pub status: Status,
    pub tags: BTreeSet<String>,
}

/// Minimal set of changes needed to flag a record.
///
/// Every field is optional; a request with nothing set must not be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRequest {
    pub set_status: Option<Status>,
    pub add_tag: Option<TagSpec>,
    pub note: Option<String>,
}

impl FlagRequest {
    pub fn is_noop(&self) -> bool {
        self.set_status.is_none() && self.add_tag.is_none() && self.note.is_none()
    }
}

/// Persistence layer a changeset is applied to.
///
/// `begin`/`commit`/`rollback` default to no-ops for stores without
/// transactions; such stores report `supports_transactions() == false`.
pub trait TargetStore: Send + Sync {
    fn name(&self) -> &str;

    fn supports_transactions(&self) -> bool {
        false
    }

    fn begin(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        async { Ok(()) }
    }

    fn commit(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        async { Ok(()) }
    }

    fn rollback(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        async { Ok(()) }
    }

    /// Every record of one kind that carries a source id, with
    /// `target_pk` and `tags` populated.
    ///
    /// Records created outside the sync have no source id and must be left
    /// out; they are never reconciled or flagged.
    fn list_all(
        &self,
        kind: RecordKind,
    ) -> impl Future<Output = Result<Vec<SyncRecord>, CoreError>> + Send;

    /// Create a record; returns its primary key.
    fn create(&self, record: &SyncRecord) -> impl Future<Output = Result<String, CoreError>> + Send;

    /// Bring the fields named in `diff` to the values in `record`.
    fn update(
        &self,
        target_pk: &str,
        record: &SyncRecord,
        diff: &FieldDiff,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn audit_state(
        &self,
        kind: RecordKind,
        target_pk: &str,
    ) -> impl Future<Output = Result<AuditState, CoreError>> + Send;

    fn flag(
        &self,
        kind: RecordKind,
        target_pk: &str,
        request: &FlagRequest,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete(
        &self,
        kind: RecordKind,
        target_pk: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}
