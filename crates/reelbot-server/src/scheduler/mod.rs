//! Background job scheduler.
//!
//! Registers the recurring publication, metrics, queue-check, and queue
//! top-up cycles on a [`JobScheduler`]. Every cycle runs under its own lock:
//! a tick that fires while the previous run is still going is skipped, and
//! shutdown waits for in-flight runs before stopping the scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reelbot_core::AppConfig;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::services::Services;

const QUEUE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// One lock per cycle kind.
#[derive(Debug, Clone, Default)]
pub struct CycleLocks {
    pub publish: Arc<Mutex<()>>,
    pub metrics: Arc<Mutex<()>>,
    pub generate: Arc<Mutex<()>>,
}

impl CycleLocks {
    /// Waits for every in-flight cycle to finish and keeps new ones out.
    async fn drain(&self) -> [tokio::sync::MutexGuard<'_, ()>; 3] {
        [
            self.publish.lock().await,
            self.metrics.lock().await,
            self.generate.lock().await,
        ]
    }
}

pub struct Scheduler {
    jobs: JobScheduler,
    locks: CycleLocks,
}

impl Scheduler {
    /// Stops scheduling new runs once in-flight cycles have completed.
    ///
    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if the scheduler fails to shut down.
    pub async fn shutdown(mut self) -> Result<(), JobSchedulerError> {
        let _guards = self.locks.drain().await;
        tracing::info!("scheduler: in-flight cycles finished; stopping");
        self.jobs.shutdown().await
    }
}

/// Builds and starts the background job scheduler.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    services: &Arc<Services>,
    config: &AppConfig,
    locks: CycleLocks,
) -> Result<Scheduler, JobSchedulerError> {
    let jobs = JobScheduler::new().await?;

    if let Some(publication) = &services.publication {
        let publication = Arc::clone(publication);
        register_cycle(
            &jobs,
            "publish",
            Duration::from_secs(config.publish_interval_secs),
            Arc::clone(&locks.publish),
            move || {
                let publication = Arc::clone(&publication);
                async move {
                    if let Err(e) = publication.run_cycle().await {
                        tracing::error!(error = %e, "scheduler: publication cycle failed");
                    }
                }
            },
        )
        .await?;
    }

    if let Some(metrics) = &services.metrics {
        let metrics = Arc::clone(metrics);
        register_cycle(
            &jobs,
            "metrics",
            Duration::from_secs(config.metrics_interval_secs),
            Arc::clone(&locks.metrics),
            move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    if let Err(e) = metrics.run_cycle().await {
                        tracing::error!(error = %e, "scheduler: metrics cycle failed");
                    }
                }
            },
        )
        .await?;
    }

    let lifecycle = services.lifecycle.clone();
    let low_watermark = i64::from(config.queue_low_watermark);
    register_cycle(
        &jobs,
        "queue-check",
        QUEUE_CHECK_INTERVAL,
        Arc::new(Mutex::new(())),
        move || {
            let lifecycle = lifecycle.clone();
            async move { check_queue(&lifecycle, low_watermark).await }
        },
    )
    .await?;

    if let Some(pipeline) = &services.pipeline {
        let pipeline = Arc::clone(pipeline);
        let target = config.queue_target;
        register_cycle(
            &jobs,
            "top-up",
            Duration::from_secs(config.generate_interval_secs),
            Arc::clone(&locks.generate),
            move || {
                let pipeline = Arc::clone(&pipeline);
                async move {
                    if let Err(e) = pipeline.top_up_queue(target).await {
                        tracing::error!(error = %e, "scheduler: queue top-up failed");
                    }
                }
            },
        )
        .await?;
    }

    jobs.start().await?;
    Ok(Scheduler { jobs, locks })
}

async fn register_cycle<F, Fut>(
    jobs: &JobScheduler,
    name: &'static str,
    every: Duration,
    lock: Arc<Mutex<()>>,
    run: F,
) -> Result<(), JobSchedulerError>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let job = Job::new_repeated_async(every, move |_uuid, _lock| {
        let lock = Arc::clone(&lock);
        let cycle = run();
        Box::pin(async move {
            run_exclusive(name, &lock, cycle).await;
        })
    })?;
    jobs.add(job).await?;
    tracing::info!(job = name, every_secs = every.as_secs(), "scheduler: job registered");
    Ok(())
}

/// Runs `cycle` unless another run holding `lock` is still in flight.
/// Returns whether the cycle ran.
async fn run_exclusive(name: &str, lock: &Mutex<()>, cycle: impl Future<Output = ()>) -> bool {
    let Ok(_guard) = lock.try_lock() else {
        tracing::warn!(job = name, "scheduler: previous run still in progress; skipping tick");
        return false;
    };
    tracing::debug!(job = name, "scheduler: cycle starting");
    cycle.await;
    true
}

/// Warns when fewer pending reels remain than the configured watermark.
async fn check_queue(lifecycle: &reelbot_engine::LifecycleManager, low_watermark: i64) {
    match lifecycle.queue_status().await {
        Ok(status) if status.pending < low_watermark => {
            tracing::warn!(
                pending = status.pending,
                scheduled = status.scheduled,
                low_watermark,
                "review queue is running low"
            );
        }
        Ok(status) => {
            tracing::debug!(pending = status.pending, "review queue healthy");
        }
        Err(e) => tracing::error!(error = %e, "scheduler: queue check failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let lock = Mutex::new(());
        let held = lock.lock().await;
        assert!(!run_exclusive("publish", &lock, async {}).await);
        drop(held);
        assert!(run_exclusive("publish", &lock, async {}).await);
    }

    #[tokio::test]
    async fn drain_waits_for_the_running_cycle() {
        let locks = CycleLocks::default();
        let running = Arc::clone(&locks.publish);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (finish_tx, finish_rx) = tokio::sync::oneshot::channel::<()>();

        let cycle = tokio::spawn(async move {
            let _guard = running.lock().await;
            started_tx.send(()).ok();
            finish_rx.await.ok();
        });
        started_rx.await.unwrap();

        let drained = tokio::spawn(async move {
            let _guards = locks.drain().await;
        });
        tokio::task::yield_now().await;
        assert!(!drained.is_finished());

        finish_tx.send(()).unwrap();
        cycle.await.unwrap();
        drained.await.unwrap();
    }
}
