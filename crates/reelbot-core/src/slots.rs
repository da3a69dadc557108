//! Weekly posting slots used when an approval does not name a time.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

use crate::CoreError;

/// A recurring weekly publication time in UTC, e.g. `fri 18:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingSlot {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl std::fmt::Display for PostingSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.weekday.to_string().to_lowercase(),
            self.time.format("%H:%M")
        )
    }
}

impl std::str::FromStr for PostingSlot {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidPostingSlot {
            slot: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split_whitespace();
        let (Some(day), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected '<weekday> <HH:MM>'"));
        };

        let weekday = day
            .parse::<Weekday>()
            .map_err(|_| invalid("unrecognised weekday"))?;
        let time =
            NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| invalid("time must be HH:MM"))?;

        Ok(Self { weekday, time })
    }
}

/// Parse a comma-separated slot list such as `"mon 18:00, fri 09:30"`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidPostingSlot`] for the first malformed entry.
pub fn parse_posting_slots(raw: &str) -> Result<Vec<PostingSlot>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Earliest slot occurrence strictly after `now`, or `None` without slots.
#[must_use]
pub fn next_posting_time(now: DateTime<Utc>, slots: &[PostingSlot]) -> Option<DateTime<Utc>> {
    slots
        .iter()
        .map(|slot| {
            let days_ahead = (i64::from(slot.weekday.num_days_from_monday())
                - i64::from(now.weekday().num_days_from_monday()))
            .rem_euclid(7);
            let date = now.date_naive() + Duration::days(days_ahead);
            let candidate = date.and_time(slot.time).and_utc();
            if candidate <= now {
                candidate + Duration::days(7)
            } else {
                candidate
            }
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_slot_list() {
        let slots = parse_posting_slots("mon 18:00, Fri 09:30").expect("valid slots");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].weekday, Weekday::Mon);
        assert_eq!(slots[1].time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(slots[1].to_string(), "fri 09:30");
    }

    #[test]
    fn rejects_malformed_slots() {
        assert!(parse_posting_slots("mon").is_err());
        assert!(parse_posting_slots("funday 18:00").is_err());
        assert!(parse_posting_slots("mon 25:00").is_err());
        assert!(parse_posting_slots("mon 18:00 extra").is_err());
    }

    #[test]
    fn next_time_later_same_day() {
        // 2026-03-13 is a Friday.
        let now = Utc.with_ymd_and_hms(2026, 3, 13, 12, 0, 0).unwrap();
        let slots = parse_posting_slots("fri 18:00").unwrap();
        assert_eq!(
            next_posting_time(now, &slots),
            Some(Utc.with_ymd_and_hms(2026, 3, 13, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn next_time_rolls_to_next_week_when_passed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 13, 18, 0, 0).unwrap();
        let slots = parse_posting_slots("fri 18:00").unwrap();
        assert_eq!(
            next_posting_time(now, &slots),
            Some(Utc.with_ymd_and_hms(2026, 3, 20, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn next_time_picks_earliest_slot() {
        let now = Utc.with_ymd_and_hms(2026, 3, 13, 19, 0, 0).unwrap();
        let slots = parse_posting_slots("mon 18:00,wed 18:00,fri 18:00").unwrap();
        assert_eq!(
            next_posting_time(now, &slots),
            Some(Utc.with_ymd_and_hms(2026, 3, 16, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn no_slots_means_no_time() {
        assert!(next_posting_time(Utc::now(), &[]).is_none());
    }
}
