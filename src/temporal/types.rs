//! Types produced by the time resolver.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Time Range
// ============================================================================

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting empty and reversed intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidRange(format!(
                "end {} is not after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a range starting at `start` and lasting `duration`.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self, ValidationError> {
        Self::new(start, start + duration)
    }

    /// Length of the range.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the range has no length.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open overlap test. Empty ranges overlap nothing.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.start < other.end && other.start < self.end
    }

    /// Check if an instant falls inside the range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

// ============================================================================
// Resolution Output
// ============================================================================

/// How precisely a range was specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Only a day was mentioned; the range covers the whole local day.
    Day,
    /// A time of day (or time span) was mentioned.
    Time,
}

/// A resolved time range together with the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRange {
    /// The absolute range.
    pub range: TimeRange,
    /// Day-only or time-of-day precision.
    pub granularity: Granularity,
    /// The fragments of the expression that produced this range.
    pub text: String,
}

/// Why a temporal-looking fragment could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Calendar date does not exist ("February 30").
    InvalidDate,
    /// Clock time does not exist ("25:00", "13pm").
    InvalidTime,
    /// Range ends before it starts.
    ReversedRange,
    /// Too vague to place on a calendar ("next week", "soon").
    Vague,
    /// Repeating pattern ("every Monday").
    Recurring,
    /// Local time skipped by a timezone transition.
    NonexistentLocalTime,
    /// Two bare numbers ("9-5") that may not be clock hours.
    AmbiguousRange,
}

impl UnresolvedReason {
    /// Human-readable explanation.
    pub fn describe(&self) -> &'static str {
        match self {
            UnresolvedReason::InvalidDate => "not a valid calendar date",
            UnresolvedReason::InvalidTime => "not a valid time of day",
            UnresolvedReason::ReversedRange => "range ends before it starts",
            UnresolvedReason::Vague => "too vague to schedule",
            UnresolvedReason::Recurring => "recurring times are not supported",
            UnresolvedReason::NonexistentLocalTime => "local time does not exist in this timezone",
            UnresolvedReason::AmbiguousRange => "unclear which hours are meant; add am or pm",
        }
    }
}

/// A fragment that looked temporal but was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedFragment {
    /// The original text.
    pub text: String,
    /// Byte offset where the fragment starts.
    pub start_offset: usize,
    /// Byte offset where the fragment ends.
    pub end_offset: usize,
    /// Why it was dropped.
    pub reason: UnresolvedReason,
}

/// Result of resolving one expression: zero or more ranges plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Ranges in order of mention.
    pub ranges: Vec<ResolvedRange>,
    /// Fragments that were dropped.
    pub unresolved: Vec<UnresolvedFragment>,
}

impl Resolution {
    /// Iterate over just the time ranges.
    pub fn time_ranges(&self) -> impl Iterator<Item = TimeRange> + '_ {
        self.ranges.iter().map(|r| r.range)
    }

    /// Whether nothing at all was resolved.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Options for the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Length given to a point-in-time mention such as "3pm".
    pub default_duration: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            default_duration: Duration::minutes(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, h, m, 0).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_and_reversed() {
        assert!(TimeRange::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeRange::new(at(11, 0), at(10, 0)).is_err());
        assert!(TimeRange::new(at(10, 0), at(10, 30)).is_ok());
    }

    #[test]
    fn test_back_to_back_ranges_do_not_overlap() {
        let a = TimeRange::new(at(15, 0), at(15, 30)).unwrap();
        let b = TimeRange::new(at(15, 30), at(16, 0)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
        let b = TimeRange::new(at(10, 30), at(12, 0)).unwrap();
        let inner = TimeRange::new(at(10, 15), at(10, 45)).unwrap();
        assert!(a.overlaps(&b) && b.overlaps(&a));
        assert!(a.overlaps(&inner) && inner.overlaps(&a));
    }

    #[test]
    fn test_empty_range_overlaps_nothing() {
        let empty = TimeRange {
            start: at(10, 15),
            end: at(10, 15),
        };
        let a = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
        assert!(!empty.overlaps(&a));
        assert!(!a.overlaps(&empty));
    }

    #[test]
    fn test_contains_is_half_open() {
        let a = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
        assert!(a.contains(at(10, 0)));
        assert!(!a.contains(at(11, 0)));
        assert_eq!(a.duration(), Duration::hours(1));
    }
}
