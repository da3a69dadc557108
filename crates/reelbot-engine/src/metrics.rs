//! Engagement collection cycle.

use std::sync::Arc;
use std::time::Duration;

use reelbot_core::{bucket_start, Clock, NewPostMetrics, PublishedPost, Store, StoreError};
use serde::Serialize;

use crate::collaborators::{MetricsError, MetricsSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub candidates: usize,
    pub collected: usize,
    /// Snapshots another run already wrote for this bucket.
    pub duplicates: usize,
    pub errored: usize,
}

pub struct MetricsCollector {
    store: Arc<dyn Store>,
    source: Arc<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    maturation: Duration,
    fetch_timeout: Duration,
}

enum Collected {
    Inserted,
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error(transparent)]
    Source(#[from] MetricsError),
    #[error("metrics fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MetricsCollector {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn MetricsSource>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        maturation: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            interval,
            maturation,
            fetch_timeout,
        }
    }

    /// Collects one snapshot per matured publication for the current bucket.
    ///
    /// Running twice inside one bucket collects nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the candidate list cannot be loaded;
    /// per-post failures are logged and skipped.
    pub async fn run_cycle(&self) -> Result<MetricsReport, StoreError> {
        let now = self.clock.now();
        let bucket = bucket_start(now, self.interval);
        let maturation =
            chrono::Duration::from_std(self.maturation).unwrap_or_else(|_| chrono::Duration::zero());
        let due = self
            .store
            .posts_due_for_metrics(now - maturation, bucket)
            .await?;

        let mut report = MetricsReport {
            candidates: due.len(),
            ..MetricsReport::default()
        };

        for post in &due {
            match self.collect(post, bucket).await {
                Ok(Collected::Inserted) => report.collected += 1,
                Ok(Collected::Duplicate) => report.duplicates += 1,
                Err(err) => {
                    report.errored += 1;
                    tracing::warn!(
                        published_post_id = post.id,
                        external_media_id = %post.external_media_id,
                        error = %err,
                        "metrics collection failed"
                    );
                }
            }
        }

        tracing::info!(
            bucket_start = %bucket,
            candidates = report.candidates,
            collected = report.collected,
            duplicates = report.duplicates,
            errored = report.errored,
            "metrics cycle complete"
        );
        Ok(report)
    }

    async fn collect(
        &self,
        post: &PublishedPost,
        bucket: chrono::DateTime<chrono::Utc>,
    ) -> Result<Collected, ItemError> {
        let counts = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch(&post.external_media_id),
        )
        .await
        .map_err(|_| ItemError::Timeout(self.fetch_timeout))??;

        let snapshot = NewPostMetrics {
            published_post_id: post.id,
            counts,
            collected_at: self.clock.now(),
            bucket_start: bucket,
        };
        match self.store.insert_post_metrics(&snapshot).await? {
            Some(_) => Ok(Collected::Inserted),
            None => Ok(Collected::Duplicate),
        }
    }
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
