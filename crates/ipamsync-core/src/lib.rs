//! Sync engine between a Bluecat Address Manager and a Nautobot IPAM.
//!
//! The pipeline runs in four stages:
//!
//! - **Fetch** ([`fetch`]) walks the Bluecat container tree below one
//!   configuration. [`FetchScheduler`] drains a growing job queue with a
//!   bounded pool of workers, each owning a forked [`EntitySource`] client;
//!   [`TreeWalker`] is the lazy single-client equivalent.
//!
//! - **Normalize** ([`convert`]) turns fetched entities into [`SyncRecord`]s
//!   keyed by canonical CIDR, mapping every status through a closed table.
//!
//! - **Reconcile** ([`reconcile()`]) compares source and target records and
//!   partitions every key into create / update / orphan / unchanged.
//!
//! - **Apply** ([`apply`]) writes the [`Changeset`] to a [`TargetStore`].
//!   Orphans are skipped, flagged for deletion, or deleted with explicit
//!   opt-in; flagging is idempotent.
//!
//! [`SyncManager`] ties the stages together. The crate never reads
//! configuration files; callers hand in a [`SyncConfig`].

pub mod apply;
pub mod bluecat;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod model;
pub mod nautobot;
pub mod reconcile;
pub mod sync;
pub mod target;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use apply::{
    ApplyOptions, ApplyReport, ApplyResult, OrphanPolicy, apply_changeset, apply_orphan_policy,
};
pub use bluecat::connect_source;
pub use config::{
    Dataset, FetchOptions, RetryPolicy, SourceConfig, SyncConfig, SyncOptions, TargetConfig,
    TlsVerification,
};
pub use error::CoreError;
pub use fetch::{
    CanaryWarning, EntitySource, FetchProgress, FetchScheduler, Snapshot, TraversalPolicy,
    TreeWalker,
};
pub use model::{
    Changeset, Entity, EntityId, EntityKind, EntityType, FieldChange, FieldDiff, RecordKey,
    RecordKind, RecordUpdate, Status, SyncRecord,
};
pub use nautobot::NautobotStore;
pub use reconcile::reconcile;
pub use sync::{SyncManager, SyncPlan, SyncReport};
pub use target::{AuditState, FlagRequest, TagSpec, TargetStore};
