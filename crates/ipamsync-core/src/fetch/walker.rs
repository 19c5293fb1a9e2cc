// ── Recursive tree walker ──
//
// Flat pre-order stream: a container is yielded, then its whole subtree,
// then its next sibling. Pages are requested only as the stream is polled.
// An explicit stack of frames replaces recursion.

use std::collections::{HashSet, VecDeque};

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use tracing::warn;

use super::{EntitySource, PageFetcher, TraversalPolicy};
use crate::config::FetchOptions;
use crate::error::CoreError;
use crate::model::{Entity, EntityId, EntityType};

/// Traversal state of one container.
struct Frame {
    parent_id: EntityId,
    type_index: usize,
    offset: u32,
    buffer: VecDeque<Entity>,
}

impl Frame {
    fn new(parent_id: EntityId) -> Self {
        Self {
            parent_id,
            type_index: 0,
            offset: 0,
            buffer: VecDeque::new(),
        }
    }

    /// Next `(type, offset)` to request, or `None` when every type is drained.
    fn next_request(&self, types: &[EntityType]) -> Option<(EntityType, u32)> {
        types.get(self.type_index).map(|t| (*t, self.offset))
    }

    fn advance(&mut self, received: usize, has_more: bool) {
        if has_more {
            self.offset = self
                .offset
                .saturating_add(u32::try_from(received).unwrap_or(u32::MAX));
        } else {
            self.type_index += 1;
            self.offset = 0;
        }
    }
}

pub struct TreeWalker<'a, S> {
    fetcher: PageFetcher<'a, S>,
    policy: &'a TraversalPolicy,
}

impl<'a, S: EntitySource> TreeWalker<'a, S> {
    pub fn new(source: &'a S, options: &'a FetchOptions, policy: &'a TraversalPolicy) -> Self {
        Self {
            fetcher: PageFetcher::new(source, options),
            policy,
        }
    }

    /// Lazily stream every entity below `root`.
    ///
    /// A container is always yielded before any of its descendants. A
    /// container id seen twice is yielded but not descended into again.
    pub fn walk(&self, root: EntityId) -> impl Stream<Item = Result<Entity, CoreError>> + '_ {
        let types = self.policy.fetch_types();

        try_stream! {
            let mut stack = vec![Frame::new(root)];
            let mut visited = HashSet::from([root]);

            while let Some(frame) = stack.last_mut() {
                if let Some(entity) = frame.buffer.pop_front() {
                    let descend = if self.policy.is_container(entity.entity_type) {
                        let first_visit = visited.insert(entity.id);
                        if !first_visit {
                            warn!(id = %entity.id, "container listed twice, not descending again");
                        }
                        first_visit
                    } else {
                        false
                    };

                    let id = entity.id;
                    yield entity;

                    if descend {
                        stack.push(Frame::new(id));
                    }
                    continue;
                }

                let Some((object_type, offset)) = frame.next_request(&types) else {
                    stack.pop();
                    continue;
                };

                let page = self
                    .fetcher
                    .fetch_page(frame.parent_id, object_type, offset)
                    .await?;
                let received = page.entities.len();
                frame.buffer.extend(page.entities);
                frame.advance(received, page.has_more);
            }
        }
    }

    /// Drain [`walk`](Self::walk) into a vector.
    pub async fn collect(&self, root: EntityId) -> Result<Vec<Entity>, CoreError> {
        self.walk(root).try_collect().await
    }
}
