//! Time resolution for spoken and written scheduling phrases.
//!
//! Recognized forms:
//! - Absolute dates: "2024-01-15", "January 15", "Jan 15th, 2025", "1/15"
//! - Relative days: "today", "tomorrow", "next Tuesday", "in 3 days"
//! - Times of day: "3pm", "15:30", "noon", "at 10", "tomorrow morning"
//! - Time spans: "10 to noon", "from 2 to 4pm", "between 1 and 3pm", "2-4pm"
//! - Conjunctions: "Monday and Wednesday at 3pm", "tomorrow at 3pm and 5pm"
//!
//! Vague ("next week", "soon"), recurring ("every Monday") and invalid
//! ("February 30", "25:00") fragments are reported as [`UnresolvedFragment`]s
//! and never abort the rest of the parse.
//!
//! The reference instant carries both "now" and the timezone, so resolution
//! is a pure function of its inputs.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use regex::{Captures, Regex};

use super::types::*;

// ============================================================================
// Mentions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    fn default_time(self) -> NaiveTime {
        let hour = match self {
            Period::Morning => 9,
            Period::Afternoon => 14,
            Period::Evening => 18,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Move an hour-ambiguous time into this part of the day.
    fn adjust(self, time: NaiveTime) -> NaiveTime {
        let hour = time.hour();
        let shifted = match self {
            Period::Morning if hour > 12 => hour - 12,
            Period::Afternoon | Period::Evening if hour < 12 => hour + 12,
            _ => hour,
        };
        time.with_hour(shifted).unwrap_or(time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeOfDay {
    /// A single clock time, sized with the default duration.
    Point(NaiveTime),
    /// An explicit span; `end_next_day` is set when it runs to midnight.
    Span {
        start: NaiveTime,
        end: NaiveTime,
        end_next_day: bool,
    },
}

impl TimeOfDay {
    fn start(&self) -> NaiveTime {
        match self {
            TimeOfDay::Point(t) => *t,
            TimeOfDay::Span { start, .. } => *start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MentionKind {
    Date(NaiveDate),
    /// "tonight": a date that also puts times in the evening.
    Night(NaiveDate),
    /// `explicit` is false when am/pm was guessed and a later
    /// "in the morning" may still correct it.
    Time { value: TimeOfDay, explicit: bool },
    Period(Period),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone)]
struct Mention {
    kind: MentionKind,
    start: usize,
    end: usize,
    /// Wins overlaps against lower-priority mentions of the same text.
    priority: u8,
}

impl Mention {
    fn new(kind: MentionKind, m: regex::Match<'_>, priority: u8) -> Self {
        Self {
            kind,
            start: m.start(),
            end: m.end(),
            priority,
        }
    }

    fn outranks(&self, other: &Mention) -> bool {
        match self.priority.cmp(&other.priority) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.end - self.start >= other.end - other.start,
        }
    }
}

// ============================================================================
// Time Resolver
// ============================================================================

/// Resolves natural-language time expressions into absolute UTC ranges.
#[derive(Debug, Clone, Default)]
pub struct TimeResolver {
    options: ResolveOptions,
}

impl TimeResolver {
    /// Create a resolver with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with custom options.
    pub fn with_options(options: ResolveOptions) -> Self {
        Self { options }
    }

    /// Create a resolver that gives point-in-time mentions `duration`.
    pub fn with_default_duration(duration: Duration) -> Self {
        Self::with_options(ResolveOptions {
            default_duration: duration,
        })
    }

    /// The options this resolver was built with.
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve every time mention in `expression` relative to `reference`.
    ///
    /// The local date and clock of `reference` anchor relative phrases;
    /// its timezone converts local wall times to UTC.
    pub fn resolve<Tz: TimeZone>(&self, expression: &str, reference: &DateTime<Tz>) -> Resolution {
        let now = reference.naive_local();
        let mentions = Self::scan(expression, now.date());

        let mut assembler = Assembler {
            text: expression,
            tz: reference.timezone(),
            now,
            options: self.options,
            carry: None,
            resolution: Resolution::default(),
        };

        let mut slot = Slot::default();
        let mut prev_end = 0;

        for mention in &mentions {
            let separated = CONJUNCTION_PATTERN.is_match(&expression[prev_end..mention.start]);
            prev_end = mention.end;

            match mention.kind {
                MentionKind::Unresolved(reason) => {
                    assembler.unresolved(mention.start..mention.end, reason);
                }
                MentionKind::Date(date) | MentionKind::Night(date) => {
                    if slot.time.is_some() && (!slot.dates.is_empty() || separated) {
                        assembler.finish(std::mem::take(&mut slot));
                    }
                    slot.cover(mention);
                    slot.dates.push((date, Some(mention.start..mention.end)));
                    if let MentionKind::Night(_) = mention.kind {
                        slot.apply_period(Period::Evening, mention.start..mention.end);
                    }
                }
                MentionKind::Time { value, explicit } => {
                    if slot.time.is_some() {
                        assembler.finish(std::mem::take(&mut slot));
                    }
                    let value = match (slot.period.as_ref(), value, explicit) {
                        (Some((period, _)), TimeOfDay::Point(t), false) => {
                            TimeOfDay::Point(period.adjust(t))
                        }
                        _ => value,
                    };
                    slot.cover(mention);
                    slot.time = Some(SlotTime {
                        value,
                        explicit,
                        span: mention.start..mention.end,
                    });
                }
                MentionKind::Period(period) => {
                    slot.cover(mention);
                    slot.apply_period(period, mention.start..mention.end);
                }
            }
        }
        assembler.finish(slot);

        tracing::debug!(
            expression,
            ranges = assembler.resolution.ranges.len(),
            unresolved = assembler.resolution.unresolved.len(),
            "Resolved time expression"
        );

        assembler.resolution
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    fn scan(text: &str, today: NaiveDate) -> Vec<Mention> {
        let mut mentions = Vec::new();

        mentions.extend(Self::scan_absolute_dates(text, today));
        mentions.extend(Self::scan_relative_dates(text, today));
        mentions.extend(Self::scan_spans(text));
        mentions.extend(Self::scan_times(text));
        mentions.extend(Self::scan_unresolvable(text));

        mentions.sort_by(|a, b| a.start.cmp(&b.start).then(b.priority.cmp(&a.priority)));
        Self::remove_overlaps(&mut mentions);

        mentions
    }

    /// Remove overlapping mentions, keeping the higher-priority (then longer) one.
    fn remove_overlaps(mentions: &mut Vec<Mention>) {
        if mentions.len() < 2 {
            return;
        }

        let mut i = 0;
        while i < mentions.len() - 1 {
            if mentions[i + 1].start < mentions[i].end {
                if mentions[i].outranks(&mentions[i + 1]) {
                    mentions.remove(i + 1);
                } else {
                    mentions.remove(i);
                }
            } else {
                i += 1;
            }
        }
    }

    /// "2024-01-15", "January 15", "Jan 15th, 2025", "1/15", "1/15/25".
    fn scan_absolute_dates(text: &str, today: NaiveDate) -> Vec<Mention> {
        let mut results = Vec::new();

        for cap in ISO_DATE_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let date = match (
                cap[1].parse::<i32>(),
                cap[2].parse::<u32>(),
                cap[3].parse::<u32>(),
            ) {
                (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
                _ => None,
            };
            results.push(Mention::new(date_or_invalid(date), whole, 4));
        }

        for cap in MONTH_DAY_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let month = month_number(&cap[1]);
            let day = cap[2].parse::<u32>().ok();
            let year = cap.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
            let date = match (month, day) {
                (Some(month), Some(day)) => calendar_date(today, year, month, day),
                _ => None,
            };
            results.push(Mention::new(date_or_invalid(date), whole, 4));
        }

        for cap in NUMERIC_DATE_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let year = cap
                .get(3)
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .map(|y| if y < 100 { 2000 + y } else { y });
            let date = match (cap[1].parse::<u32>(), cap[2].parse::<u32>()) {
                (Ok(month), Ok(day)) => calendar_date(today, year, month, day),
                _ => None,
            };
            results.push(Mention::new(date_or_invalid(date), whole, 3));
        }

        results
    }

    /// "today", "tomorrow", "next Tuesday", "in 3 days".
    fn scan_relative_dates(text: &str, today: NaiveDate) -> Vec<Mention> {
        let mut results = Vec::new();

        for cap in RELATIVE_DAY_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let term = cap[1].to_lowercase();
            let kind = match term.as_str() {
                "tonight" => MentionKind::Night(today),
                "tomorrow" => MentionKind::Date(today + Duration::days(1)),
                "today" => MentionKind::Date(today),
                _ => MentionKind::Date(today + Duration::days(2)),
            };
            results.push(Mention::new(kind, whole, 4));
        }

        for cap in WEEKDAY_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(weekday) = weekday_from_name(&cap[2]) else {
                continue;
            };
            let skip_this_week = cap
                .get(1)
                .is_some_and(|m| m.as_str().eq_ignore_ascii_case("next"));
            results.push(Mention::new(
                MentionKind::Date(next_weekday(today, weekday, skip_this_week)),
                whole,
                4,
            ));
        }

        for cap in IN_DAYS_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(count) = small_number(&cap[1]) else {
                continue;
            };
            let unit = cap[2].to_lowercase();
            let days = if unit.starts_with("week") {
                count * 7
            } else {
                count
            };
            results.push(Mention::new(
                MentionKind::Date(today + Duration::days(days)),
                whole,
                4,
            ));
        }

        results
    }

    /// "10 to noon", "from 2 to 4pm", "between 1 and 3pm", "2-4pm".
    fn scan_spans(text: &str) -> Vec<Mention> {
        let mut results = Vec::new();

        for cap in SPAN_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let prefix = cap.get(1).map(|m| m.as_str().to_lowercase());
            let connector = cap[6].to_lowercase();
            if connector == "and" && prefix.as_deref() != Some("between") {
                continue;
            }

            let (Some(start), Some(end)) = (
                ClockSide::from_captures(&cap, 2),
                ClockSide::from_captures(&cap, 7),
            ) else {
                continue;
            };

            // "11 to 1" reads as showing hours; a bare "9-5" may be a count or
            // an address, so it is reported instead of guessed.
            let anchored = prefix.is_some()
                || start.meridiem.is_some()
                || end.meridiem.is_some()
                || start.has_minutes
                || end.has_minutes
                || matches!(connector.as_str(), "to" | "until" | "till");
            if !anchored {
                results.push(Mention::new(
                    MentionKind::Unresolved(UnresolvedReason::AmbiguousRange),
                    whole,
                    1,
                ));
                continue;
            }

            let kind = match resolve_span(start, end) {
                Ok(value) => MentionKind::Time {
                    value,
                    explicit: true,
                },
                Err(reason) => MentionKind::Unresolved(reason),
            };
            results.push(Mention::new(kind, whole, 5));
        }

        results
    }

    /// "3pm", "3:30 p.m.", "15:30", "noon", "at 10", "in the morning".
    fn scan_times(text: &str) -> Vec<Mention> {
        let mut results = Vec::new();

        for cap in TIME_12H_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let hour = cap[1].parse::<u32>().unwrap_or(99);
            let minute = cap
                .get(2)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            let meridiem = parse_meridiem(&cap[3]);
            let kind = match clock(hour, minute, Some(meridiem)) {
                Ok(t) => MentionKind::Time {
                    value: TimeOfDay::Point(t),
                    explicit: true,
                },
                Err(reason) => MentionKind::Unresolved(reason),
            };
            results.push(Mention::new(kind, whole, 4));
        }

        for cap in TIME_24H_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let digits = &cap[1];
            let hour = digits.parse::<u32>().unwrap_or(99);
            let minute = cap[2].parse::<u32>().unwrap_or(99);
            let padded = digits.len() == 2 && digits.starts_with('0');
            let result = if padded {
                clock(hour, minute, None).map(|t| (t, true))
            } else {
                business_clock(hour, minute)
            };
            let kind = match result {
                Ok((t, explicit)) => MentionKind::Time {
                    value: TimeOfDay::Point(t),
                    explicit,
                },
                Err(reason) => MentionKind::Unresolved(reason),
            };
            results.push(Mention::new(kind, whole, 3));
        }

        for cap in NAMED_TIME_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let hour = if cap[1].eq_ignore_ascii_case("midnight") {
                0
            } else {
                12
            };
            if let Some(t) = NaiveTime::from_hms_opt(hour, 0, 0) {
                results.push(Mention::new(
                    MentionKind::Time {
                        value: TimeOfDay::Point(t),
                        explicit: true,
                    },
                    whole,
                    3,
                ));
            }
        }

        for cap in AT_HOUR_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(hour) = cap
                .get(1)
                .or_else(|| cap.get(2))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            let kind = match business_clock(hour, 0) {
                Ok((t, explicit)) => MentionKind::Time {
                    value: TimeOfDay::Point(t),
                    explicit,
                },
                Err(reason) => MentionKind::Unresolved(reason),
            };
            results.push(Mention::new(kind, whole, 2));
        }

        for cap in PERIOD_PATTERN.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let period = match cap[1].to_lowercase().as_str() {
                "morning" => Period::Morning,
                "afternoon" => Period::Afternoon,
                _ => Period::Evening,
            };
            results.push(Mention::new(MentionKind::Period(period), whole, 2));
        }

        results
    }

    /// Fragments that look temporal but cannot become a single range.
    fn scan_unresolvable(text: &str) -> Vec<Mention> {
        let mut results = Vec::new();

        for m in RECURRING_PATTERN.find_iter(text) {
            results.push(Mention::new(
                MentionKind::Unresolved(UnresolvedReason::Recurring),
                m,
                6,
            ));
        }

        for m in VAGUE_PATTERN.find_iter(text) {
            results.push(Mention::new(
                MentionKind::Unresolved(UnresolvedReason::Vague),
                m,
                1,
            ));
        }

        results
    }
}

/// Resolve with default options.
pub fn resolve<Tz: TimeZone>(expression: &str, reference: &DateTime<Tz>) -> Resolution {
    TimeResolver::new().resolve(expression, reference)
}

/// Short spoken label for an instant in a timezone, e.g. "Wednesday 10am".
pub fn spoken_label<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = instant.with_timezone(tz);
    if local.minute() == 0 {
        local.format("%A %-I%P").to_string()
    } else {
        local.format("%A %-I:%M%P").to_string()
    }
}

/// Label for a resolved range: a day name for whole days, else [`spoken_label`].
pub fn range_label<Tz: TimeZone>(range: &ResolvedRange, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match range.granularity {
        Granularity::Day => range
            .range
            .start
            .with_timezone(tz)
            .format("%A %B %-d")
            .to_string(),
        Granularity::Time => spoken_label(range.range.start, tz),
    }
}

// ============================================================================
// Assembly
// ============================================================================

#[derive(Debug, Clone)]
struct SlotTime {
    value: TimeOfDay,
    explicit: bool,
    span: Range<usize>,
}

/// Dates and an optional time that combine into ranges.
#[derive(Debug, Clone, Default)]
struct Slot {
    dates: Vec<(NaiveDate, Option<Range<usize>>)>,
    time: Option<SlotTime>,
    period: Option<(Period, Range<usize>)>,
    start: usize,
    end: usize,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.time.is_none() && self.period.is_none()
    }

    fn cover(&mut self, mention: &Mention) {
        if self.is_empty() {
            self.start = mention.start;
        }
        self.end = self.end.max(mention.end);
    }

    /// Move a guessed am/pm into `period`, or hold the period for a later time.
    fn apply_period(&mut self, period: Period, span: Range<usize>) {
        match self.time.as_mut() {
            Some(time) => {
                if let (TimeOfDay::Point(t), false) = (time.value, time.explicit) {
                    time.value = TimeOfDay::Point(period.adjust(t));
                    time.explicit = true;
                }
            }
            None => self.period = Some((period, span)),
        }
    }
}

struct Assembler<'a, Tz: TimeZone> {
    text: &'a str,
    tz: Tz,
    now: NaiveDateTime,
    options: ResolveOptions,
    /// Last explicit date, inherited by a following time-only slot.
    carry: Option<(NaiveDate, Option<Range<usize>>)>,
    resolution: Resolution,
}

impl<Tz: TimeZone> Assembler<'_, Tz> {
    fn unresolved(&mut self, span: Range<usize>, reason: UnresolvedReason) {
        self.resolution.unresolved.push(UnresolvedFragment {
            text: self.text[span.clone()].to_string(),
            start_offset: span.start,
            end_offset: span.end,
            reason,
        });
    }

    fn finish(&mut self, mut slot: Slot) {
        if slot.is_empty() {
            return;
        }

        if slot.time.is_none() {
            if let Some((period, span)) = slot.period.clone() {
                slot.time = Some(SlotTime {
                    value: TimeOfDay::Point(period.default_time()),
                    explicit: true,
                    span,
                });
            }
        }

        let dates = if !slot.dates.is_empty() {
            self.carry = slot.dates.last().cloned();
            slot.dates.clone()
        } else if let Some(carried) = self.carry.clone() {
            vec![carried]
        } else if let Some(time) = &slot.time {
            vec![(self.anchor_day(time.value), None)]
        } else {
            return;
        };

        for (date, date_span) in dates {
            let label = [date_span, slot.time.as_ref().map(|t| t.span.clone())]
                .into_iter()
                .flatten()
                .map(|span| self.text[span].to_string())
                .collect::<Vec<_>>()
                .join(" ");

            let (granularity, start, end) = match slot.time.as_ref().map(|t| t.value) {
                None => (
                    Granularity::Day,
                    date.and_time(NaiveTime::MIN),
                    (date + Duration::days(1)).and_time(NaiveTime::MIN),
                ),
                Some(TimeOfDay::Point(t)) => {
                    let start = date.and_time(t);
                    (Granularity::Time, start, start + self.options.default_duration)
                }
                Some(TimeOfDay::Span {
                    start,
                    end,
                    end_next_day,
                }) => {
                    let end_date = if end_next_day {
                        date + Duration::days(1)
                    } else {
                        date
                    };
                    (Granularity::Time, date.and_time(start), end_date.and_time(end))
                }
            };

            let Some(start_utc) = self.to_utc(&start) else {
                self.unresolved(slot.start..slot.end, UnresolvedReason::NonexistentLocalTime);
                continue;
            };
            let end_utc = self
                .to_utc(&end)
                .unwrap_or_else(|| start_utc + (end - start));

            let range = match TimeRange::new(start_utc, end_utc) {
                Ok(range) => range,
                Err(_) => {
                    self.unresolved(slot.start..slot.end, UnresolvedReason::ReversedRange);
                    continue;
                }
            };

            if self.resolution.ranges.iter().any(|r| r.range == range) {
                continue;
            }
            self.resolution.ranges.push(ResolvedRange {
                range,
                granularity,
                text: label,
            });
        }
    }

    /// Day for a time with no date: today, or tomorrow once the time has passed.
    fn anchor_day(&self, time: TimeOfDay) -> NaiveDate {
        let today = self.now.date();
        if time.start() < self.now.time() {
            today + Duration::days(1)
        } else {
            today
        }
    }

    fn to_utc(&self, local: &NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ============================================================================
// Clock Helpers
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ClockSide {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
    has_minutes: bool,
}

impl ClockSide {
    /// Read one side of a span; `base` is the index of its hour group.
    fn from_captures(cap: &Captures<'_>, base: usize) -> Option<Self> {
        if let Some(named) = cap.get(base + 3) {
            let meridiem = if named.as_str().eq_ignore_ascii_case("noon") {
                Meridiem::Pm
            } else {
                Meridiem::Am
            };
            return Some(Self {
                hour: 12,
                minute: 0,
                meridiem: Some(meridiem),
                has_minutes: false,
            });
        }

        let hour = cap.get(base)?.as_str().parse().ok()?;
        let minutes = cap.get(base + 1);
        let minute = match minutes {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self {
            hour,
            minute,
            meridiem: cap.get(base + 2).map(|m| parse_meridiem(m.as_str())),
            has_minutes: minutes.is_some(),
        })
    }
}

fn parse_meridiem(raw: &str) -> Meridiem {
    if raw.to_ascii_lowercase().starts_with('p') {
        Meridiem::Pm
    } else {
        Meridiem::Am
    }
}

/// Build a clock time. With a meridiem the hour must be 1-12, without it 0-23.
fn clock(hour: u32, minute: u32, meridiem: Option<Meridiem>) -> Result<NaiveTime, UnresolvedReason> {
    let hour = match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return Err(UnresolvedReason::InvalidTime),
        Some(Meridiem::Pm) if hour != 12 => hour + 12,
        Some(Meridiem::Am) if hour == 12 => 0,
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(UnresolvedReason::InvalidTime)
}

/// Clock time for an hour spoken without am/pm: 1-7 are afternoon
/// showings, 8-11 morning, 12 noon. Other hours are read as 24-hour.
/// The flag is true when the reading is certain.
fn business_clock(hour: u32, minute: u32) -> Result<(NaiveTime, bool), UnresolvedReason> {
    match hour {
        1..=7 => clock(hour, minute, Some(Meridiem::Pm)).map(|t| (t, false)),
        8..=12 => clock(hour, minute, None).map(|t| (t, false)),
        _ => clock(hour, minute, None).map(|t| (t, true)),
    }
}

fn resolve_span(start: ClockSide, end: ClockSide) -> Result<TimeOfDay, UnresolvedReason> {
    let twelve_hour = |side: &ClockSide| (1..=12).contains(&side.hour);

    let (start_time, end_time) = match (start.meridiem, end.meridiem) {
        (Some(sm), Some(em)) => (
            clock(start.hour, start.minute, Some(sm))?,
            clock(end.hour, end.minute, Some(em))?,
        ),
        (None, Some(em)) => {
            let end_time = clock(end.hour, end.minute, Some(em))?;
            let as_pm = clock(start.hour, start.minute, Some(Meridiem::Pm));
            let start_time = match as_pm {
                Ok(t) if em == Meridiem::Pm && t < end_time => t,
                _ => {
                    let meridiem = twelve_hour(&start).then_some(Meridiem::Am);
                    clock(start.hour, start.minute, meridiem)?
                }
            };
            (start_time, end_time)
        }
        (Some(sm), None) => {
            let start_time = clock(start.hour, start.minute, Some(sm))?;
            let mut end_time = clock(end.hour, end.minute, twelve_hour(&end).then_some(sm))?;
            if end_time <= start_time && twelve_hour(&end) {
                end_time = clock(end.hour, end.minute, Some(Meridiem::Pm))?;
            }
            (start_time, end_time)
        }
        (None, None) => {
            let (start_time, _) = business_clock(start.hour, start.minute)?;
            let (mut end_time, _) = business_clock(end.hour, end.minute)?;
            if end_time <= start_time && end.hour < 12 {
                end_time = clock(end.hour, end.minute, Some(Meridiem::Pm))?;
            }
            (start_time, end_time)
        }
    };

    let end_next_day = end_time == NaiveTime::MIN && start_time > NaiveTime::MIN;
    if !end_next_day && end_time <= start_time {
        return Err(UnresolvedReason::ReversedRange);
    }

    Ok(TimeOfDay::Span {
        start: start_time,
        end: end_time,
        end_next_day,
    })
}

// ============================================================================
// Date Helpers
// ============================================================================

fn date_or_invalid(date: Option<NaiveDate>) -> MentionKind {
    match date {
        Some(date) => MentionKind::Date(date),
        None => MentionKind::Unresolved(UnresolvedReason::InvalidDate),
    }
}

/// A month/day with an optional year. Without a year, a date that has
/// already passed this year means next year.
fn calendar_date(today: NaiveDate, year: Option<i32>, month: u32, day: u32) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date < today => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
                Some(date) => Some(date),
                // Feb 29 may exist next year even when it does not this year.
                None => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

/// Next occurrence of `target` on or after `today`. With `skip_this_week`
/// ("next Tuesday") the occurrence in the following week is returned.
fn next_weekday(today: NaiveDate, target: Weekday, skip_this_week: bool) -> NaiveDate {
    let current = i64::from(today.weekday().num_days_from_monday());
    let target = i64::from(target.num_days_from_monday());

    let mut days_ahead = (target - current).rem_euclid(7);
    if skip_this_week {
        days_ahead += 7;
    }

    today + Duration::days(days_ahead)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn small_number(raw: &str) -> Option<i64> {
    match raw.to_lowercase().as_str() {
        "a" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        digits => digits.parse().ok(),
    }
}

// ============================================================================
// Regex Patterns
// ============================================================================

/// One clock reading inside a span: hour, minutes, meridiem, or a named time.
const CLOCK: &str = r"(?:(\d{1,2})(?::(\d{2}))?\s*(a\.m\.|p\.m\.|am\b|pm\b)?|(noon|midnight))";

static ISO_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("Invalid regex"));
static MONTH_DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s*(\d{4})\b)?",
    )
    .expect("Invalid regex")
});
static NUMERIC_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").expect("Invalid regex")
});
static RELATIVE_DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(day\s+after\s+tomorrow|today|tonight|tomorrow)\b").expect("Invalid regex")
});
static WEEKDAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(next|this|coming)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("Invalid regex")
});
static IN_DAYS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bin\s+(\d{1,2}|a|one|two|three|four|five|six|seven)\s+(days?|weeks?)\b")
        .expect("Invalid regex")
});
static SPAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(from|between)\s+)?{CLOCK}\s*(-|–|\bto\b|\buntil\b|\btill\b|\band\b)\s*{CLOCK}"
    ))
    .expect("Invalid regex")
});
static TIME_12H_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.m\.|p\.m\.|am\b|pm\b)").expect("Invalid regex")
});
static TIME_24H_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("Invalid regex"));
static NAMED_TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(noon|midday|midnight)\b").expect("Invalid regex"));
static AT_HOUR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:at\s+(\d{1,2})(?:\s*o'?clock)?|(\d{1,2})\s*o'?clock)\b")
        .expect("Invalid regex")
});
static PERIOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in\s+the\s+)?(morning|afternoon|evening)\b").expect("Invalid regex")
});
static RECURRING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:every\s+(?:other\s+)?(?:day|week|month|morning|afternoon|evening|monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?|daily|weekly|monthly)\b",
    )
    .expect("Invalid regex")
});
static VAGUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:next\s+week|this\s+week|next\s+month|this\s+month|sometime|some\s+time|at\s+some\s+point|later|soon|whenever|asap)\b",
    )
    .expect("Invalid regex")
});
static CONJUNCTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(,|&|;|\band\b|\bor\b|\balso\b|\bthen\b|\bplus\b)").expect("Invalid regex")
});
