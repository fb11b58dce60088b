//! [`TimeSpecification`]: when a [`crate::Requirement`] is due.

use chrono::{Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Either an explicit set of absolute instants, or a cron-like conjunction of
/// broken-down-time constraints.
///
/// When `only_at_times` is non-empty it bypasses every other field, even if
/// they are also set — this mirrors the source behavior verbatim rather than
/// rejecting the combination, since the intent of a populated
/// `constrained_*` alongside `only_at_times` is undocumented upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpecification {
    /// Absolute epoch seconds; if non-empty, bypasses every other field.
    pub only_at_times: Vec<i64>,
    /// Allowed days-of-month (1-31). Empty matches any.
    pub constrained_dom: Vec<i64>,
    /// Allowed days-of-week (0=Sunday..6=Saturday). Empty matches any.
    pub constrained_dow: Vec<i64>,
    /// Allowed hours (0-23). Empty matches any.
    pub constrained_hours: Vec<i64>,
    /// Allowed minutes (0-59). Empty matches any.
    pub constrained_minutes: Vec<i64>,
    /// Allowed seconds (0-59). Empty matches any.
    pub constrained_seconds: Vec<i64>,
    /// How many seconds before the deadline it is still acceptable to start
    /// a shorter item.
    pub gap: i64,
}

impl TimeSpecification {
    /// Whether `candidate_time` (epoch seconds) satisfies this specification.
    /// Broken-down fields are evaluated against local time, matching the
    /// source's use of `localtime_r`.
    #[must_use]
    pub fn is_due(&self, candidate_time: i64) -> bool {
        if !self.only_at_times.is_empty() {
            return self.only_at_times.contains(&candidate_time);
        }
        let Some(local) = chrono::Local.timestamp_opt(candidate_time, 0).single() else {
            return false;
        };
        let dow = i64::from(local.weekday().num_days_from_sunday());
        Self::constraint_met(&self.constrained_dom, i64::from(local.day()))
            && Self::constraint_met(&self.constrained_dow, dow)
            && Self::constraint_met(&self.constrained_hours, i64::from(local.hour()))
            && Self::constraint_met(&self.constrained_minutes, i64::from(local.minute()))
            && Self::constraint_met(&self.constrained_seconds, i64::from(local.second()))
    }

    fn constraint_met(allowlist: &[i64], field: i64) -> bool {
        allowlist.is_empty() || allowlist.contains(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::TimeSpecification;

    #[test]
    fn empty_spec_matches_every_instant() {
        let spec = TimeSpecification::default();
        assert!(spec.is_due(0));
        assert!(spec.is_due(1_700_000_000));
    }

    #[test]
    fn only_at_times_bypasses_other_constraints() {
        let spec = TimeSpecification {
            only_at_times: vec![1_700_000_000],
            constrained_hours: vec![3],
            ..TimeSpecification::default()
        };
        assert!(spec.is_due(1_700_000_000));
        assert!(!spec.is_due(1_700_000_001));
    }

    #[test]
    fn constrained_fields_are_a_conjunction() {
        use chrono::Timelike;
        let now = chrono::Local::now();
        let candidate = now.timestamp();
        let matching = TimeSpecification {
            constrained_hours: vec![i64::from(now.hour())],
            constrained_minutes: vec![i64::from(now.minute())],
            ..TimeSpecification::default()
        };
        assert!(matching.is_due(candidate));

        let wrong_hour = i64::from((now.hour() + 1) % 24);
        let non_matching = TimeSpecification {
            constrained_hours: vec![wrong_hour],
            ..TimeSpecification::default()
        };
        assert!(!non_matching.is_due(candidate));
    }
}
