// ── Concurrent fetch scheduler ──
//
// A bounded pool of workers drains a job queue that grows as containers are
// discovered. Each worker owns one forked source client; a finished job
// hands its client back to the next queued job. The loop waits on whichever
// job finishes first, so a slow subtree never stalls the others.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Drained, EntitySource, PageFetcher, Snapshot, TraversalPolicy};
use crate::config::FetchOptions;
use crate::error::CoreError;
use crate::model::{EntityId, FetchJob};

/// Live counters published while a fetch runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchProgress {
    pub jobs_queued: usize,
    pub jobs_in_flight: usize,
    pub jobs_completed: usize,
    pub entities: usize,
}

type JobOutcome<S> = (S, FetchJob, Result<Drained, CoreError>);

pub struct FetchScheduler {
    options: Arc<FetchOptions>,
    cancel: CancellationToken,
    progress: watch::Sender<FetchProgress>,
}

impl FetchScheduler {
    pub fn new(options: FetchOptions) -> Self {
        let (progress, _) = watch::channel(FetchProgress::default());
        Self {
            options: Arc::new(options),
            cancel: CancellationToken::new(),
            progress,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Token that aborts a running fetch when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchProgress> {
        self.progress.subscribe()
    }

    /// Fetch every entity below `root` using the worker pool.
    ///
    /// The first failing job aborts all in-flight jobs; the error reports
    /// how many jobs and entities had completed.
    pub async fn run<S>(
        &self,
        source: &S,
        root: EntityId,
        policy: &TraversalPolicy,
    ) -> Result<Snapshot, CoreError>
    where
        S: EntitySource + 'static,
    {
        let types = policy.fetch_types();
        let workers = self.options.workers.max(1);
        let mut idle: Vec<S> = (0..workers)
            .map(|_| source.fork())
            .collect::<Result<_, _>>()?;

        let mut queue: VecDeque<FetchJob> =
            types.iter().map(|t| FetchJob::new(root, *t)).collect();
        let mut visited: HashSet<EntityId> = HashSet::from([root]);
        let mut in_flight: JoinSet<JobOutcome<S>> = JoinSet::new();
        let mut snapshot = Snapshot {
            root_id: Some(root),
            ..Snapshot::default()
        };
        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        // Aborting this run must not poison later runs.
        let run_cancel = self.cancel.child_token();

        info!(%root, workers, "starting concurrent fetch");

        loop {
            // Hand every idle client a queued job.
            while !queue.is_empty() {
                let Some(client) = idle.pop() else { break };
                let Some(job) = queue.pop_front() else {
                    idle.push(client);
                    break;
                };
                self.spawn_job(&mut in_flight, client, job, &run_cancel);
            }
            self.publish(&queue, &in_flight, &snapshot);

            if in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                () = run_cancel.cancelled() => Err(CoreError::Cancelled),
                () = wait_until(deadline) => Err(CoreError::DeadlineExceeded {
                    seconds: self.options.deadline.map_or(0, |d| d.as_secs()),
                }),
                joined = in_flight.join_next() => match joined {
                    Some(Ok(outcome)) => Ok(outcome),
                    Some(Err(e)) => Err(CoreError::Internal(format!("fetch worker failed: {e}"))),
                    None => break,
                },
            };

            let result = match joined {
                Ok((client, job, result)) => {
                    idle.push(client);
                    result.map(|drained| (job, drained))
                }
                Err(e) => Err(e),
            };

            match result {
                Ok((job, drained)) => {
                    snapshot.jobs_completed += 1;
                    for entity in &drained.entities {
                        if policy.is_container(entity.entity_type) {
                            if visited.insert(entity.id) {
                                queue.extend(types.iter().map(|t| FetchJob::new(entity.id, *t)));
                            } else {
                                warn!(id = %entity.id, "container listed twice, not descending again");
                            }
                        }
                    }
                    debug!(
                        parent_id = %job.parent_id,
                        object_type = %job.object_type,
                        received = drained.entities.len(),
                        pages = drained.pages,
                        "job complete"
                    );
                    snapshot.entities.extend(drained.entities);
                    snapshot.warnings.extend(drained.warnings);
                }
                Err(e) => {
                    in_flight.abort_all();
                    run_cancel.cancel();
                    warn!(error = %e, "fetch aborted");
                    return Err(CoreError::SnapshotIncomplete {
                        jobs_completed: snapshot.jobs_completed,
                        entities_fetched: snapshot.entities.len(),
                        source: Box::new(e),
                    });
                }
            }
        }

        self.publish(&queue, &in_flight, &snapshot);
        info!(
            entities = snapshot.entities.len(),
            jobs = snapshot.jobs_completed,
            warnings = snapshot.warnings.len(),
            "fetch complete"
        );
        Ok(snapshot)
    }

    fn spawn_job<S>(
        &self,
        in_flight: &mut JoinSet<JobOutcome<S>>,
        client: S,
        job: FetchJob,
        cancel: &CancellationToken,
    ) where
        S: EntitySource + 'static,
    {
        let options = Arc::clone(&self.options);
        let cancel = cancel.clone();

        in_flight.spawn(async move {
            let result = PageFetcher::new(&client, &options)
                .fetch_job(job, &cancel)
                .await;
            (client, job, result)
        });
    }

    fn publish<S: 'static>(
        &self,
        queue: &VecDeque<FetchJob>,
        in_flight: &JoinSet<JobOutcome<S>>,
        snapshot: &Snapshot,
    ) {
        self.progress.send_replace(FetchProgress {
            jobs_queued: queue.len(),
            jobs_in_flight: in_flight.len(),
            jobs_completed: snapshot.jobs_completed,
            entities: snapshot.entities.len(),
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
