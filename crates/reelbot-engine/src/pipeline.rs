//! Reel generation: select a combination, record its usage, render it, and
//! register the result for review.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use reelbot_core::{NewReel, Reel, ThemedCombination};
use serde::Serialize;
use thiserror::Error;

use crate::collaborators::{RenderError, Renderer};
use crate::lifecycle::{LifecycleError, LifecycleManager};
use crate::selector::{ContentSelector, SelectionError};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopUpReport {
    pub backlog_before: i64,
    pub generated: usize,
    pub failed: usize,
}

pub struct GenerationPipeline<R = StdRng> {
    selector: Arc<ContentSelector<R>>,
    renderer: Arc<dyn Renderer>,
    lifecycle: LifecycleManager,
}

impl<R: Rng + Send> GenerationPipeline<R> {
    pub fn new(
        selector: Arc<ContentSelector<R>>,
        renderer: Arc<dyn Renderer>,
        lifecycle: LifecycleManager,
    ) -> Self {
        Self {
            selector,
            renderer,
            lifecycle,
        }
    }

    /// Produces one pending reel for `theme`.
    ///
    /// Usage is recorded before rendering and released again if rendering
    /// or registration fails, so abandoned combinations leave no trace.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] from whichever stage failed.
    pub async fn generate(&self, theme: &str) -> Result<Reel, GenerationError> {
        let combo = self.selector.select(theme).await?;
        tracing::debug!(
            theme = %combo.theme,
            video_id = combo.video.id,
            audio_id = combo.audio.id,
            quote_id = combo.quote.id,
            "combination selected"
        );
        self.selector.update_usage(&combo).await?;

        match self.render_and_register(&combo).await {
            Ok(reel) => Ok(reel),
            Err(err) => {
                self.selector.release_usage(&combo).await;
                Err(err)
            }
        }
    }

    async fn render_and_register(&self, combo: &ThemedCombination) -> Result<Reel, GenerationError> {
        let result = self.renderer.render(combo).await?;
        let reel = NewReel::from_render(combo, result);
        Ok(self.lifecycle.create(&reel).await?)
    }

    /// Generates reels on random themes until the backlog of pending,
    /// approved, and scheduled reels reaches `target`.
    ///
    /// Individual generation failures are logged and counted; the loop makes
    /// exactly one attempt per missing reel.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if the backlog cannot be read or no
    /// themes are configured.
    pub async fn top_up_queue(&self, target: u32) -> Result<TopUpReport, GenerationError> {
        let backlog = self.lifecycle.queue_status().await?.backlog();
        let mut report = TopUpReport {
            backlog_before: backlog,
            ..TopUpReport::default()
        };
        let missing = i64::from(target) - backlog;
        if missing <= 0 {
            tracing::debug!(backlog, target, "queue is full");
            return Ok(report);
        }

        for _ in 0..missing {
            let theme = self.selector.next_theme()?.name.clone();
            match self.generate(&theme).await {
                Ok(reel) => {
                    report.generated += 1;
                    tracing::info!(reel_id = reel.id, theme = %theme, "reel generated");
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(theme = %theme, error = %err, "reel generation failed");
                }
            }
        }

        tracing::info!(
            backlog_before = report.backlog_before,
            generated = report.generated,
            failed = report.failed,
            "queue top-up complete"
        );
        Ok(report)
    }

    /// Registers a reel rendered outside the pipeline, recording usage for
    /// its assets the same way [`GenerationPipeline::generate`] does.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Lifecycle`] if validation or registration
    /// fails, or [`GenerationError::Selection`] if usage cannot be recorded.
    pub async fn register(&self, reel: &NewReel) -> Result<Reel, GenerationError> {
        let ids = reel.asset_ids();
        self.selector.record_asset_usage(&ids).await?;

        match self.lifecycle.create(reel).await {
            Ok(created) => Ok(created),
            Err(err) => {
                self.selector.release_asset_usage(&ids).await;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
