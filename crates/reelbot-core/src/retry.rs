//! Retry budget and exponential back-off for publish attempts.
//!
//! After a failed attempt the post's `retry_count` is incremented. Once it
//! reaches `max_retries` the post is exhausted; otherwise the next attempt
//! is pushed to `now + min(base_delay * 2^retry_count, max_delay)`.

use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(300),
            max_delay: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// What to persist after a failed publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Keep the post pending and try again at `next_attempt_at`.
    Retry {
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
    },
    /// The retry budget is spent; the post and its reel become failed.
    Exhausted { retry_count: i32 },
}

impl FailureDisposition {
    #[must_use]
    pub fn retry_count(&self) -> i32 {
        match *self {
            FailureDisposition::Retry { retry_count, .. }
            | FailureDisposition::Exhausted { retry_count } => retry_count,
        }
    }
}

impl RetryPolicy {
    /// Back-off delay before the attempt following failure number `retry_count`.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 1u32 << retry_count.min(20);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide the outcome of a failure for a post that had `prior_retries`.
    #[must_use]
    pub fn on_failure(&self, prior_retries: i32, now: DateTime<Utc>) -> FailureDisposition {
        let retry_count = prior_retries.max(0).saturating_add(1);
        let reached = u32::try_from(retry_count).unwrap_or(u32::MAX);
        if reached >= self.max_retries {
            return FailureDisposition::Exhausted { retry_count };
        }

        let next_attempt_at = chrono::Duration::from_std(self.backoff(reached))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        FailureDisposition::Retry {
            retry_count,
            next_attempt_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3_600),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let p = policy(10);
        assert_eq!(p.backoff(0), Duration::from_secs(60));
        assert_eq!(p.backoff(1), Duration::from_secs(120));
        assert_eq!(p.backoff(3), Duration::from_secs(480));
        assert_eq!(p.backoff(6), Duration::from_secs(3_600));
        assert_eq!(p.backoff(40), Duration::from_secs(3_600));
    }

    #[test]
    fn third_failure_exhausts_budget_of_three() {
        let now = Utc::now();
        assert_eq!(
            policy(3).on_failure(2, now),
            FailureDisposition::Exhausted { retry_count: 3 }
        );
    }

    #[test]
    fn third_failure_retries_under_budget_of_five() {
        let now = Utc::now();
        match policy(5).on_failure(2, now) {
            FailureDisposition::Retry {
                retry_count,
                next_attempt_at,
            } => {
                assert_eq!(retry_count, 3);
                assert_eq!(next_attempt_at, now + chrono::Duration::seconds(480));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn first_failure_pushes_schedule_forward() {
        let now = Utc::now();
        let d = policy(3).on_failure(0, now);
        assert_eq!(
            d,
            FailureDisposition::Retry {
                retry_count: 1,
                next_attempt_at: now + chrono::Duration::seconds(120),
            }
        );
        assert_eq!(d.retry_count(), 1);
    }

    #[test]
    fn single_attempt_budget_fails_immediately() {
        assert_eq!(
            policy(1).on_failure(0, Utc::now()),
            FailureDisposition::Exhausted { retry_count: 1 }
        );
    }
}
