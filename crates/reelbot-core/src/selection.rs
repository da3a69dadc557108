//! Novelty weighting for content selection.
//!
//! `weight = 1 / (1 + usage_count) * recency_factor`, where the recency
//! factor drops to `dampening` while the asset is inside the freshness
//! window.

use chrono::{DateTime, Duration, Utc};

use crate::domain::Asset;

pub const DEFAULT_FRESHNESS_DAYS: i64 = 7;
pub const DEFAULT_DAMPENING: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightPolicy {
    pub freshness_window: Duration,
    /// Multiplier in `(0, 1]` applied to recently used assets.
    pub dampening: f64,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            freshness_window: Duration::days(DEFAULT_FRESHNESS_DAYS),
            dampening: DEFAULT_DAMPENING,
        }
    }
}

impl WeightPolicy {
    #[must_use]
    pub fn recency_factor(&self, last_used_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        match last_used_at {
            Some(at) if now - at < self.freshness_window => self.dampening,
            _ => 1.0,
        }
    }
}

/// Selection weight for `asset` at `now`. Always strictly positive.
#[must_use]
pub fn selection_weight(asset: &Asset, policy: &WeightPolicy, now: DateTime<Utc>) -> f64 {
    let usage = f64::from(asset.usage_count.max(0));
    (1.0 / (1.0 + usage)) * policy.recency_factor(asset.last_used_at, now)
}
