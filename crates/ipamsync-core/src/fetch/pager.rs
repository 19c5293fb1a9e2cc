// ── Paginated fetcher ──
//
// Fetches one page of one type under one parent. A page shorter than the
// page size is the last one; a full page means "ask again at offset + len".

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CanaryWarning, EntitySource};
use crate::config::FetchOptions;
use crate::error::CoreError;
use crate::model::{Entity, EntityId, EntityType, FetchJob, RawEntity};

/// One page of entities.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entities: Vec<Entity>,
    pub has_more: bool,
    pub canary: Option<CanaryWarning>,
}

/// Every page of one type under one parent.
#[derive(Debug, Clone, Default)]
pub struct Drained {
    pub entities: Vec<Entity>,
    pub warnings: Vec<CanaryWarning>,
    pub pages: usize,
}

pub struct PageFetcher<'a, S> {
    source: &'a S,
    options: &'a FetchOptions,
}

impl<'a, S: EntitySource> PageFetcher<'a, S> {
    pub fn new(source: &'a S, options: &'a FetchOptions) -> Self {
        Self { source, options }
    }

    /// Fetch the page starting at `offset`.
    ///
    /// Excluded (DHCP-only) parents yield an empty final page without
    /// touching the source.
    pub async fn fetch_page(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        offset: u32,
    ) -> Result<Page, CoreError> {
        if self.options.is_excluded(parent_id) {
            debug!(%parent_id, %object_type, "skipping excluded container");
            return Ok(Page::default());
        }

        let page_size = self.options.page_size.max(1);
        let raw = self
            .fetch_with_retry(parent_id, object_type, offset, page_size)
            .await
            .map_err(|source| CoreError::FetchFailed {
                parent_id,
                object_type,
                offset,
                source: Box::new(source),
            })?;

        let has_more = u32::try_from(raw.len()).is_ok_and(|n| n == page_size);
        let entities = raw
            .into_iter()
            .map(|r| Entity::from_raw(r, parent_id))
            .collect::<Result<Vec<_>, _>>()?;

        let canary = dhcp_canary(parent_id, object_type, offset, &entities);
        if let Some(ref c) = canary {
            warn!(
                parent_id = %c.parent_id,
                offset = c.offset,
                count = c.count,
                "every address on this page is DHCP-managed; \
                 is the container missing from the DHCP-only list?"
            );
        }

        debug!(
            %parent_id,
            %object_type,
            offset,
            received = entities.len(),
            has_more,
            "fetched page"
        );

        Ok(Page {
            entities,
            has_more,
            canary,
        })
    }

    /// Fetch pages until a short one arrives.
    ///
    /// `cancel` is checked before every page request.
    pub async fn fetch_all(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        cancel: &CancellationToken,
    ) -> Result<Drained, CoreError> {
        self.fetch_job(FetchJob::new(parent_id, object_type), cancel)
            .await
    }

    /// Drain one job, starting at its page offset.
    pub async fn fetch_job(
        &self,
        job: FetchJob,
        cancel: &CancellationToken,
    ) -> Result<Drained, CoreError> {
        let FetchJob {
            parent_id,
            object_type,
            page_offset,
        } = job;
        let mut drained = Drained::default();
        let mut offset = page_offset;

        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let page = self.fetch_page(parent_id, object_type, offset).await?;
            drained.pages += 1;
            let received = u32::try_from(page.entities.len()).unwrap_or(u32::MAX);
            drained.entities.extend(page.entities);
            drained.warnings.extend(page.canary);

            if !page.has_more {
                break;
            }
            offset = offset.saturating_add(received);
        }

        Ok(drained)
    }

    async fn fetch_with_retry(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<RawEntity>, CoreError> {
        let retry = self.options.retry;
        let mut attempt: u32 = 0;

        loop {
            match self
                .source
                .fetch_entities(parent_id, object_type, offset, page_size)
                .await
            {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.delay_for(attempt);
                    warn!(
                        %parent_id,
                        %object_type,
                        offset,
                        attempt,
                        error = %e,
                        "transient fetch failure, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn dhcp_canary(
    parent_id: EntityId,
    object_type: EntityType,
    offset: u32,
    entities: &[Entity],
) -> Option<CanaryWarning> {
    let all_dhcp = !entities.is_empty()
        && object_type.is_address()
        && entities
            .iter()
            .all(|e| e.state().is_some_and(|s| s.starts_with("DHCP_")));

    all_dhcp.then(|| CanaryWarning {
        parent_id,
        object_type,
        offset,
        count: entities.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::testing::{FakeSource, address, network};

    fn options(page_size: u32) -> FetchOptions {
        FetchOptions {
            page_size,
            retry: RetryPolicy::NONE,
            ..FetchOptions::default()
        }
    }

    fn networks(count: u64) -> Vec<RawEntity> {
        (0..count)
            .map(|i| network(100 + i, &format!("10.{i}.0.0/24"), "net"))
            .collect()
    }

    #[tokio::test]
    async fn drains_exact_number_of_pages() {
        // N = 25, P = 10 -> ceil(25 / 10) = 3 calls
        let source = FakeSource::new().with_children(1, EntityType::Ip4Network, networks(25));
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let drained = fetcher
            .fetch_all(EntityId(1), EntityType::Ip4Network, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(drained.entities.len(), 25);
        assert_eq!(source.calls(), 3);
        assert_eq!(drained.pages, 3);
    }

    #[tokio::test]
    async fn job_resumes_at_its_page_offset() {
        let source = FakeSource::new().with_children(1, EntityType::Ip4Network, networks(25));
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);
        let job = FetchJob::new(EntityId(1), EntityType::Ip4Network).starting_at(20);

        let drained = fetcher
            .fetch_job(job, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<u64> = drained.entities.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, (120..125).collect::<Vec<_>>());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn exact_multiple_costs_one_extra_empty_page() {
        // N = 20, P = 10 -> the second page is full, so a third (empty) one is requested
        let source = FakeSource::new().with_children(1, EntityType::Ip4Network, networks(20));
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let drained = fetcher
            .fetch_all(EntityId(1), EntityType::Ip4Network, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(drained.entities.len(), 20);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn stamps_parent_on_every_entity() {
        let source = FakeSource::new().with_children(7, EntityType::Ip4Network, networks(3));
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let page = fetcher
            .fetch_page(EntityId(7), EntityType::Ip4Network, 0)
            .await
            .unwrap();

        assert!(!page.has_more);
        assert!(page.entities.iter().all(|e| e.parent_id == Some(EntityId(7))));
    }

    #[tokio::test]
    async fn excluded_parent_makes_no_calls() {
        let source = FakeSource::new().with_children(
            7,
            EntityType::Ip4Address,
            vec![address(900, "10.0.0.5", "STATIC", Some("host"))],
        );
        let mut options = options(10);
        options.dhcp_only.insert(EntityId(7));
        let fetcher = PageFetcher::new(&source, &options);

        let page = fetcher
            .fetch_page(EntityId(7), EntityType::Ip4Address, 0)
            .await
            .unwrap();

        assert!(page.entities.is_empty());
        assert!(!page.has_more);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn all_dhcp_page_raises_canary() {
        let source = FakeSource::new().with_children(
            7,
            EntityType::Ip4Address,
            vec![
                address(900, "10.0.0.5", "DHCP_ALLOCATED", None),
                address(901, "10.0.0.6", "DHCP_FREE", None),
            ],
        );
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let page = fetcher
            .fetch_page(EntityId(7), EntityType::Ip4Address, 0)
            .await
            .unwrap();

        assert_eq!(page.entities.len(), 2);
        let canary = page.canary.unwrap();
        assert_eq!(canary.parent_id, EntityId(7));
        assert_eq!(canary.count, 2);
    }

    #[tokio::test]
    async fn mixed_page_has_no_canary() {
        let source = FakeSource::new().with_children(
            7,
            EntityType::Ip4Address,
            vec![
                address(900, "10.0.0.5", "DHCP_ALLOCATED", None),
                address(901, "10.0.0.6", "STATIC", Some("printer")),
            ],
        );
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let page = fetcher
            .fetch_page(EntityId(7), EntityType::Ip4Address, 0)
            .await
            .unwrap();
        assert!(page.canary.is_none());
    }

    #[tokio::test]
    async fn failure_carries_fetch_context() {
        let source = FakeSource::new()
            .with_children(3, EntityType::Ip4Network, networks(15))
            .fail_at(3, 10, false);
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);

        let err = fetcher
            .fetch_all(EntityId(3), EntityType::Ip4Network, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            CoreError::FetchFailed {
                parent_id,
                object_type,
                offset,
                ..
            } => {
                assert_eq!(parent_id, EntityId(3));
                assert_eq!(object_type, EntityType::Ip4Network);
                assert_eq!(offset, 10);
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let source = FakeSource::new()
            .with_children(3, EntityType::Ip4Network, networks(4))
            .fail_times(3, 2);
        let options = FetchOptions {
            page_size: 10,
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(50),
            },
            ..FetchOptions::default()
        };
        let fetcher = PageFetcher::new(&source, &options);

        let page = fetcher
            .fetch_page(EntityId(3), EntityType::Ip4Network, 0)
            .await
            .unwrap();

        assert_eq!(page.entities.len(), 4);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_page() {
        let source = FakeSource::new().with_children(1, EntityType::Ip4Network, networks(3));
        let options = options(10);
        let fetcher = PageFetcher::new(&source, &options);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch_all(EntityId(1), EntityType::Ip4Network, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(source.calls(), 0);
    }
}
