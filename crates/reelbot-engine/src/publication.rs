//! Publication cycle: claim due posts, publish each under a timeout, and
//! persist the outcome.

use std::sync::Arc;
use std::time::Duration;

use reelbot_core::{Clock, DuePost, PostStatus, RetryPolicy, Store, StoreError};
use serde::Serialize;
use thiserror::Error;

use crate::collaborators::{PublishError, Publisher};
use crate::lifecycle::LifecycleManager;

/// Extra lease time beyond the publish timeout, covering outcome writes.
const LEASE_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub attempted: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    /// Items whose outcome could not be persisted.
    pub errored: usize,
}

#[derive(Debug, Error)]
pub enum PublishNowError {
    #[error("reel {0} has no scheduled post")]
    NotScheduled(i64),
    #[error("scheduled post for reel {reel_id} is already {status}")]
    AlreadyFinished { reel_id: i64, status: PostStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Outcome {
    Published,
    Retried,
    Failed,
}

pub struct PublicationScheduler {
    store: Arc<dyn Store>,
    lifecycle: LifecycleManager,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    publish_timeout: Duration,
    batch_limit: i64,
}

impl PublicationScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        publish_timeout: Duration,
        batch_limit: i64,
    ) -> Self {
        Self {
            lifecycle: LifecycleManager::new(store.clone(), clock.clone(), Vec::new()),
            store,
            publisher,
            clock,
            policy,
            publish_timeout,
            batch_limit,
        }
    }

    /// Runs one publication cycle.
    ///
    /// Per-item failures, including storage failures while recording an
    /// outcome, are logged and counted; the cycle continues with the next
    /// post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the first claim fails. A claim failure
    /// later in the cycle ends it early with the report so far.
    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        let lease = chrono::Duration::from_std(self.publish_timeout + LEASE_MARGIN)
            .unwrap_or_else(|_| chrono::Duration::hours(1));

        // Posts are leased one at a time, right before their attempt, so a
        // lease never has to outlive the attempts queued ahead of it.
        let mut report = CycleReport::default();
        while i64::try_from(report.attempted).unwrap_or(i64::MAX) < self.batch_limit {
            let now = self.clock.now();
            let claimed = match self.store.claim_due_posts(now, now + lease, 1).await {
                Ok(claimed) => claimed,
                Err(err) if report.attempted == 0 => return Err(err),
                Err(err) => {
                    tracing::error!(error = %err, "failed to claim the next due post");
                    break;
                }
            };
            let Some(claim) = claimed.into_iter().next() else {
                break;
            };

            report.attempted += 1;
            match self.attempt(&claim).await {
                Ok(Outcome::Published) => report.published += 1,
                Ok(Outcome::Retried) => report.retried += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(err) => {
                    report.errored += 1;
                    tracing::error!(
                        post_id = claim.post.id,
                        reel_id = claim.post.reel_id,
                        error = %err,
                        "failed to record publish outcome"
                    );
                }
            }
        }

        if report.attempted == 0 {
            tracing::debug!("no posts due");
            return Ok(report);
        }

        tracing::info!(
            attempted = report.attempted,
            published = report.published,
            retried = report.retried,
            failed = report.failed,
            errored = report.errored,
            "publication cycle complete"
        );
        Ok(report)
    }

    async fn attempt(&self, claim: &DuePost) -> Result<Outcome, StoreError> {
        let post_id = claim.post.id;
        let reel_id = claim.post.reel_id;

        let result = match tokio::time::timeout(
            self.publish_timeout,
            self.publisher.publish(&claim.output_locator, &claim.caption),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PublishError::Transient(format!(
                "publish timed out after {}s",
                self.publish_timeout.as_secs()
            ))),
        };

        match result {
            Ok(published) => {
                let row = self
                    .lifecycle
                    .mark_published(claim, &published, self.clock.now())
                    .await
                    .inspect_err(|_| {
                        tracing::error!(
                            post_id,
                            external_media_id = %published.external_media_id,
                            "reel went live but the publication could not be recorded"
                        );
                    })?;
                tracing::info!(
                    post_id,
                    reel_id,
                    published_post_id = row.id,
                    external_media_id = %row.external_media_id,
                    "reel published"
                );
                Ok(Outcome::Published)
            }
            Err(err) => {
                let disposition = self.policy.on_failure(claim.post.retry_count, self.clock.now());
                let post = self
                    .lifecycle
                    .mark_failed(claim, &err.to_string(), disposition)
                    .await?;
                if post.status == PostStatus::Failed {
                    tracing::error!(
                        post_id,
                        reel_id,
                        retry_count = post.retry_count,
                        error = %err,
                        "retry budget exhausted; reel failed"
                    );
                    Ok(Outcome::Failed)
                } else {
                    tracing::warn!(
                        post_id,
                        reel_id,
                        retry_count = post.retry_count,
                        next_attempt_at = %post.scheduled_time,
                        error = %err,
                        "publish attempt failed; will retry"
                    );
                    Ok(Outcome::Retried)
                }
            }
        }
    }

    /// Pulls a reel's pending post forward to now and runs a cycle.
    ///
    /// A concurrently running cycle cannot attempt the same post twice: the
    /// claim lease admits one attempt at a time.
    ///
    /// # Errors
    ///
    /// Returns [`PublishNowError::NotScheduled`] when the reel was never
    /// approved, [`PublishNowError::AlreadyFinished`] when its post is
    /// published or failed, or [`PublishNowError::Store`] on storage failure.
    pub async fn publish_now(&self, reel_id: i64) -> Result<CycleReport, PublishNowError> {
        let post = match self.store.scheduled_post_for_reel(reel_id).await {
            Ok(post) => post,
            Err(StoreError::NotFound) => return Err(PublishNowError::NotScheduled(reel_id)),
            Err(other) => return Err(other.into()),
        };
        if post.status.is_terminal() {
            return Err(PublishNowError::AlreadyFinished {
                reel_id,
                status: post.status,
            });
        }

        match self.store.reschedule_post(post.id, self.clock.now()).await {
            Ok(_) => {}
            Err(StoreError::PostStatusConflict { actual }) => {
                return Err(PublishNowError::AlreadyFinished {
                    reel_id,
                    status: actual,
                })
            }
            Err(other) => return Err(other.into()),
        }
        tracing::info!(reel_id, post_id = post.id, "publishing now");
        Ok(self.run_cycle().await?)
    }
}

#[cfg(test)]
#[path = "publication_test.rs"]
mod tests;
