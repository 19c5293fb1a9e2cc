// ── Fetch engine ──
//
// Three layers over one `EntitySource`:
//   pager      one page at a time, parent stamping, retry, exclusion, canary
//   walker     lazy depth-first stream over the container tree
//   scheduler  bounded worker pool draining a dynamically growing job queue

use std::future::Future;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{Entity, EntityId, EntityType, RawEntity};

pub mod pager;
pub mod scheduler;
pub mod walker;

pub use pager::{Drained, Page, PageFetcher};
pub use scheduler::{FetchProgress, FetchScheduler};
pub use walker::TreeWalker;

/// Remote system that lists entities page by page.
///
/// Implementations must be cheap to [`fork`](Self::fork): the scheduler
/// gives every worker its own instance.
pub trait EntitySource: Send + Sync + Sized {
    /// List up to `count` children of `parent_id` with the given type,
    /// starting at offset `start`.
    fn fetch_entities(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        start: u32,
        count: u32,
    ) -> impl Future<Output = Result<Vec<RawEntity>, CoreError>> + Send;

    /// Independent instance sharing this one's authentication state.
    fn fork(&self) -> Result<Self, CoreError>;
}

/// Which types to fetch under a container and which of them are containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalPolicy {
    containers: Vec<EntityType>,
    leaves: Vec<EntityType>,
}

impl TraversalPolicy {
    pub fn new(containers: Vec<EntityType>, leaves: Vec<EntityType>) -> Self {
        Self { containers, leaves }
    }

    /// Blocks (recursed into) and networks.
    pub fn prefixes() -> Self {
        Self::new(
            vec![EntityType::Ip4Block, EntityType::Ip6Block],
            vec![EntityType::Ip4Network, EntityType::Ip6Network],
        )
    }

    /// Blocks and networks (both recursed into), pools and addresses.
    pub fn with_addresses() -> Self {
        Self::new(
            vec![
                EntityType::Ip4Block,
                EntityType::Ip6Block,
                EntityType::Ip4Network,
                EntityType::Ip6Network,
            ],
            vec![
                EntityType::Ip4IpGroup,
                EntityType::Ip4Address,
                EntityType::Ip6Address,
            ],
        )
    }

    /// Types requested under every container: containers first, so a
    /// container is always known before anything listed beside it.
    pub fn fetch_types(&self) -> Vec<EntityType> {
        self.containers
            .iter()
            .chain(self.leaves.iter())
            .copied()
            .collect()
    }

    pub fn is_container(&self, object_type: EntityType) -> bool {
        self.containers.contains(&object_type)
    }
}

/// Suspicious page: every address in a non-excluded container is DHCP-managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanaryWarning {
    pub parent_id: EntityId,
    pub object_type: EntityType,
    pub offset: u32,
    pub count: usize,
}

/// Materialized result of a full fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub root_id: Option<EntityId>,
    /// Entities in completion order.
    pub entities: Vec<Entity>,
    pub warnings: Vec<CanaryWarning>,
    pub jobs_completed: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}
