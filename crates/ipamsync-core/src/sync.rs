// ── SyncManager ──
//
// Full cycle: fetch the source tree and load the target concurrently,
// normalize, reconcile, then apply.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::apply::{ApplyOptions, ApplyReport, apply_changeset};
use crate::bluecat::connect_source;
use crate::config::{Dataset, SyncConfig, SyncOptions};
use crate::convert::normalize;
use crate::error::CoreError;
use crate::fetch::{CanaryWarning, EntitySource, FetchScheduler};
use crate::model::{Changeset, EntityId, SyncRecord};
use crate::nautobot::NautobotStore;
use crate::reconcile::reconcile;
use crate::target::TargetStore;

/// Reconciled, not yet applied, result of a sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub changeset: Changeset,
    pub warnings: Vec<CanaryWarning>,
    /// Entities fetched from the source.
    pub entities: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub plan: SyncPlan,
    pub applied: ApplyReport,
}

pub struct SyncManager<S, T> {
    source: S,
    root: EntityId,
    target: T,
    dataset: Dataset,
    apply: ApplyOptions,
    scheduler: FetchScheduler,
}

impl SyncManager<ipamsync_api::BluecatClient, NautobotStore> {
    /// Log in to Bluecat, resolve the configuration and build the Nautobot
    /// store.
    pub async fn connect(config: SyncConfig) -> Result<Self, CoreError> {
        let target = NautobotStore::connect(&config.target)?;
        let (source, root) = connect_source(&config.source).await?;
        Ok(Self::new(source, root, target, config.options))
    }
}

impl<S, T> SyncManager<S, T>
where
    S: EntitySource + 'static,
    T: TargetStore,
{
    pub fn new(source: S, root: EntityId, target: T, options: SyncOptions) -> Self {
        Self {
            source,
            root,
            target,
            dataset: options.dataset,
            apply: options.apply,
            scheduler: FetchScheduler::new(options.fetch),
        }
    }

    /// Scheduler of the fetch phase, for progress and cancellation.
    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn apply_options(&self) -> &ApplyOptions {
        &self.apply
    }

    pub fn apply_options_mut(&mut self) -> &mut ApplyOptions {
        &mut self.apply
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Fetch both sides and reconcile them without writing anything.
    #[instrument(skip(self), fields(root = %self.root, target = self.target.name()))]
    pub async fn plan(&self) -> Result<SyncPlan, CoreError> {
        let policy = self.dataset.traversal();
        let (snapshot, current) = tokio::try_join!(
            self.scheduler.run(&self.source, self.root, &policy),
            self.load_target(),
        )?;

        let desired = normalize(&snapshot)?;
        info!(
            entities = snapshot.len(),
            source_records = desired.len(),
            target_records = current.len(),
            "both sides loaded"
        );

        Ok(SyncPlan {
            changeset: reconcile(desired, current),
            warnings: snapshot.warnings,
            entities: snapshot.entities.len(),
        })
    }

    /// Apply a previously computed plan.
    pub async fn apply(&self, plan: &SyncPlan) -> Result<ApplyReport, CoreError> {
        apply_changeset(&self.target, &plan.changeset, &self.apply).await
    }

    /// Plan and apply in one go.
    ///
    /// Apply options are validated before anything is fetched.
    pub async fn run(&self) -> Result<SyncReport, CoreError> {
        self.apply.validate()?;
        let plan = self.plan().await?;
        let applied = self.apply(&plan).await?;
        Ok(SyncReport { plan, applied })
    }

    async fn load_target(&self) -> Result<Vec<SyncRecord>, CoreError> {
        let mut records = Vec::new();
        for kind in self.dataset.kinds() {
            records.extend(self.target.list_all(*kind).await?);
        }
        let loaded = records.len();
        records.retain(|r| r.source_id.is_some());
        if records.len() < loaded {
            warn!(
                skipped = loaded - records.len(),
                store = self.target.name(),
                "ignoring target records without a source id"
            );
        }
        Ok(records)
    }
}
