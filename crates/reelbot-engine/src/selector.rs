//! Weighted random selection of a themed (video, audio, quote) combination.
//!
//! Each kind is drawn independently from the assets whose tags intersect the
//! theme's tags, with probability proportional to
//! [`reelbot_core::selection_weight`]. Less-used and less-recently-used
//! assets are favoured but never excluded.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use reelbot_core::{
    selection_weight, Asset, AssetKind, Clock, Store, StoreError, Theme, ThemedCombination,
    ThemesFile, WeightPolicy,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown theme: {0}")]
    UnknownTheme(String),
    #[error("no {kind} assets match theme '{theme}'")]
    NoCandidates { kind: AssetKind, theme: String },
    #[error("no themes configured")]
    NoThemes,
    #[error("cannot weight {kind} candidates: {source}")]
    Weights {
        kind: AssetKind,
        #[source]
        source: rand::distr::weighted::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ContentSelector<R = StdRng> {
    store: Arc<dyn Store>,
    themes: ThemesFile,
    policy: WeightPolicy,
    clock: Arc<dyn Clock>,
    rng: Mutex<R>,
}

impl ContentSelector<StdRng> {
    /// Selector seeded from the operating system.
    pub fn new(
        store: Arc<dyn Store>,
        themes: ThemesFile,
        policy: WeightPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_rng(store, themes, policy, clock, StdRng::from_os_rng())
    }

    /// Selector with a reproducible draw sequence.
    pub fn seeded(
        store: Arc<dyn Store>,
        themes: ThemesFile,
        policy: WeightPolicy,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, themes, policy, clock, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> ContentSelector<R> {
    pub fn with_rng(
        store: Arc<dyn Store>,
        themes: ThemesFile,
        policy: WeightPolicy,
        clock: Arc<dyn Clock>,
        rng: R,
    ) -> Self {
        Self {
            store,
            themes,
            policy,
            clock,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn themes(&self) -> &ThemesFile {
        &self.themes
    }

    /// Picks one configured theme uniformly at random.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoThemes`] when the themes file is empty.
    pub fn next_theme(&self) -> Result<&Theme, SelectionError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.themes
            .themes
            .choose(&mut *rng)
            .ok_or(SelectionError::NoThemes)
    }

    /// Draws a video, an audio track, and a quote for `theme`.
    ///
    /// Usage counters are not touched; call [`ContentSelector::update_usage`]
    /// once the combination is committed to rendering.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownTheme`] for a theme missing from the
    /// themes file, [`SelectionError::NoCandidates`] when any kind has no
    /// matching asset, or [`SelectionError::Store`] if loading fails.
    pub async fn select(&self, theme: &str) -> Result<ThemedCombination, SelectionError> {
        let theme = self
            .themes
            .get(theme)
            .ok_or_else(|| SelectionError::UnknownTheme(theme.to_string()))?;

        let videos = self.candidates(AssetKind::Video, theme).await?;
        let audios = self.candidates(AssetKind::Audio, theme).await?;
        let quotes = self.candidates(AssetKind::Quote, theme).await?;

        let now = self.clock.now();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let video = draw(&mut *rng, AssetKind::Video, videos, &self.policy, now)?;
        let audio = draw(&mut *rng, AssetKind::Audio, audios, &self.policy, now)?;
        let quote = draw(&mut *rng, AssetKind::Quote, quotes, &self.policy, now)?;

        Ok(ThemedCombination {
            theme: theme.name.clone(),
            video,
            audio,
            quote,
        })
    }

    /// Records one use of each asset in `combo`.
    ///
    /// If a later increment fails, the increments already applied are
    /// released so the combination is counted either fully or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Store`] if an increment fails.
    pub async fn update_usage(&self, combo: &ThemedCombination) -> Result<(), SelectionError> {
        self.record_asset_usage(&combo.asset_ids()).await
    }

    /// Undoes [`ContentSelector::update_usage`] for a combination that never
    /// became a reel.
    pub async fn release_usage(&self, combo: &ThemedCombination) {
        self.release_asset_usage(&combo.asset_ids()).await;
    }

    /// All-or-nothing usage increment for an arbitrary set of assets.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Store`] if an increment fails.
    pub async fn record_asset_usage(&self, ids: &[i64]) -> Result<(), SelectionError> {
        let now = self.clock.now();
        for (done, id) in ids.iter().enumerate() {
            if let Err(err) = self.store.record_usage(*id, now).await {
                self.release_asset_usage(&ids[..done]).await;
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Failures are logged; callers already have an error to report.
    pub async fn release_asset_usage(&self, ids: &[i64]) {
        for id in ids {
            if let Err(err) = self.store.release_usage(*id).await {
                tracing::error!(asset_id = id, error = %err, "failed to release asset usage");
            }
        }
    }

    async fn candidates(&self, kind: AssetKind, theme: &Theme) -> Result<Vec<Asset>, SelectionError> {
        let assets = self.store.list_candidates(kind, &theme.tags).await?;
        if assets.is_empty() {
            return Err(SelectionError::NoCandidates {
                kind,
                theme: theme.name.clone(),
            });
        }
        Ok(assets)
    }
}

fn draw<R: Rng + ?Sized>(
    rng: &mut R,
    kind: AssetKind,
    mut candidates: Vec<Asset>,
    policy: &WeightPolicy,
    now: DateTime<Utc>,
) -> Result<Asset, SelectionError> {
    let weights = candidates
        .iter()
        .map(|asset| selection_weight(asset, policy, now));
    let index = WeightedIndex::new(weights)
        .map_err(|source| SelectionError::Weights { kind, source })?;
    Ok(candidates.swap_remove(index.sample(rng)))
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod tests;
