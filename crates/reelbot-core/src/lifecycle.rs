//! Reel state machine.
//!
//! All status changes go through [`ReelStatus::apply`]; stores persist the
//! result with a compare-and-set against the prior status.
//!
//! ```text
//! pending --approve--> approved --schedule--> scheduled --publish--> published
//!    |                                            |
//!    +--reject--> rejected                        +--fail--> failed
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReelStatus {
    Pending,
    Approved,
    Rejected,
    Scheduled,
    Published,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReelEvent {
    Approve,
    Schedule,
    Reject,
    Publish,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} a reel that is {from}")]
pub struct InvalidTransition {
    pub from: ReelStatus,
    pub event: ReelEvent,
}

impl ReelStatus {
    pub const ALL: [ReelStatus; 6] = [
        ReelStatus::Pending,
        ReelStatus::Approved,
        ReelStatus::Rejected,
        ReelStatus::Scheduled,
        ReelStatus::Published,
        ReelStatus::Failed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReelStatus::Pending => "pending",
            ReelStatus::Approved => "approved",
            ReelStatus::Rejected => "rejected",
            ReelStatus::Scheduled => "scheduled",
            ReelStatus::Published => "published",
            ReelStatus::Failed => "failed",
        }
    }

    /// Returns the status reached by applying `event`, or the rejected pair.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any (status, event) pair outside the
    /// lifecycle graph.
    pub fn apply(self, event: ReelEvent) -> Result<ReelStatus, InvalidTransition> {
        match (self, event) {
            (ReelStatus::Pending, ReelEvent::Approve) => Ok(ReelStatus::Approved),
            (ReelStatus::Pending, ReelEvent::Reject) => Ok(ReelStatus::Rejected),
            (ReelStatus::Approved, ReelEvent::Schedule) => Ok(ReelStatus::Scheduled),
            (ReelStatus::Scheduled, ReelEvent::Publish) => Ok(ReelStatus::Published),
            (ReelStatus::Scheduled, ReelEvent::Fail) => Ok(ReelStatus::Failed),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    /// Rejected, published, and failed reels never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReelStatus::Rejected | ReelStatus::Published | ReelStatus::Failed
        )
    }

    /// Whether the reel still counts toward its assets' `usage_count`.
    #[must_use]
    pub fn holds_usage(self) -> bool {
        !matches!(self, ReelStatus::Rejected)
    }
}

impl std::fmt::Display for ReelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReelStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReelStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownReelStatus(s.to_string()))
    }
}

impl ReelEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReelEvent::Approve => "approve",
            ReelEvent::Schedule => "schedule",
            ReelEvent::Reject => "reject",
            ReelEvent::Publish => "publish",
            ReelEvent::Fail => "fail",
        }
    }
}

impl std::fmt::Display for ReelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [ReelEvent; 5] = [
        ReelEvent::Approve,
        ReelEvent::Schedule,
        ReelEvent::Reject,
        ReelEvent::Publish,
        ReelEvent::Fail,
    ];

    #[test]
    fn happy_path_reaches_published() {
        let status = ReelStatus::Pending
            .apply(ReelEvent::Approve)
            .and_then(|s| s.apply(ReelEvent::Schedule))
            .and_then(|s| s.apply(ReelEvent::Publish))
            .expect("valid path");
        assert_eq!(status, ReelStatus::Published);
    }

    #[test]
    fn reject_only_from_pending() {
        assert_eq!(
            ReelStatus::Pending.apply(ReelEvent::Reject),
            Ok(ReelStatus::Rejected)
        );
        for from in [
            ReelStatus::Approved,
            ReelStatus::Scheduled,
            ReelStatus::Published,
            ReelStatus::Failed,
            ReelStatus::Rejected,
        ] {
            let err = from.apply(ReelEvent::Reject).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.event, ReelEvent::Reject);
        }
    }

    #[test]
    fn terminal_states_accept_no_events() {
        for from in ReelStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for event in EVENTS {
                assert!(
                    from.apply(event).is_err(),
                    "{from} should not accept {event}"
                );
            }
        }
    }

    #[test]
    fn no_transition_returns_to_pending() {
        for from in ReelStatus::ALL {
            for event in EVENTS {
                assert_ne!(from.apply(event), Ok(ReelStatus::Pending));
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in ReelStatus::ALL {
            assert_eq!(status.as_str().parse::<ReelStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ReelStatus>().is_err());
    }

    #[test]
    fn invalid_transition_message_names_both_sides() {
        let err = ReelStatus::Approved.apply(ReelEvent::Reject).unwrap_err();
        assert_eq!(err.to_string(), "cannot reject a reel that is approved");
    }
}
