//! Engagement math and collection buckets.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::EngagementCounts;

/// Start of the epoch-aligned collection bucket containing `now`.
///
/// Two collector runs inside the same bucket share a dedup key, so a post is
/// sampled at most once per bucket.
#[must_use]
pub fn bucket_start(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let width = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1);
    let secs = now.timestamp();
    DateTime::<Utc>::from_timestamp(secs - secs.rem_euclid(width), 0).unwrap_or(now)
}

/// `(likes + comments + shares) / reach`, or `0.0` when nothing was reached.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_rate(counts: &EngagementCounts) -> f64 {
    if counts.reach <= 0 {
        return 0.0;
    }
    let interactions = counts.likes + counts.comments + counts.shares;
    interactions as f64 / counts.reach as f64
}
