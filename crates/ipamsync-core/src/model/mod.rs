// ── Domain model ──

pub mod changeset;
pub mod entity;
pub mod record;

pub use changeset::{Changeset, FieldChange, FieldDiff, RecordUpdate};
pub use entity::{AddressRange, Entity, EntityId, EntityKind, EntityType, RawEntity, UNNAMED};
pub use record::{RecordKey, RecordKind, Status, SyncRecord, attr};

/// Unit of fetch work: drain every page of one type under one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchJob {
    pub parent_id: EntityId,
    pub object_type: EntityType,
    /// First page to request; errors carry the offset actually reached.
    pub page_offset: u32,
}

impl FetchJob {
    pub fn new(parent_id: EntityId, object_type: EntityType) -> Self {
        Self {
            parent_id,
            object_type,
            page_offset: 0,
        }
    }

    /// Resume a job from `page_offset`, e.g. after a failed run.
    #[must_use]
    pub fn starting_at(mut self, page_offset: u32) -> Self {
        self.page_offset = page_offset;
        self
    }
}
