//! Types for schedule entries and booking outcomes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::SchedulingIntent;
use crate::storage::{AgentId, PropertyId};
use crate::temporal::{Granularity, TimeRange, UnresolvedFragment};

// ============================================================================
// Schedule Entry
// ============================================================================

/// How an entry was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    #[default]
    Manual,
    Voice,
}

/// A booked showing on an agent's calendar, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub agent_id: AgentId,
    pub property_id: PropertyId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: EntrySource,
    pub created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Create an entry with a fresh id.
    pub fn new(
        agent_id: AgentId,
        property_id: PropertyId,
        range: TimeRange,
        source: EntrySource,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id,
            property_id,
            start: range.start,
            end: range.end,
            source,
            created_at: Utc::now(),
        }
    }

    /// The booked interval.
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    /// Check if this entry overlaps `range` (half-open).
    pub fn overlaps(&self, range: &TimeRange) -> bool {
        self.range().overlaps(range)
    }

    /// Duration in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Result of an atomic check-and-commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Booking {
    /// The entry was free and is now stored.
    Committed(ScheduleEntry),
    /// The agent already has `existing` in that slot; nothing was stored.
    Conflict { existing: ScheduleEntry },
}

impl Booking {
    pub fn is_committed(&self) -> bool {
        matches!(self, Booking::Committed(_))
    }
}

// ============================================================================
// Conflict Detection Types
// ============================================================================

/// A double booking between two entries of the same agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConflict {
    pub agent_id: AgentId,
    /// First entry in the conflict.
    pub entry1_id: String,
    /// Second entry in the conflict.
    pub entry2_id: String,
    /// Start of the overlapping period.
    pub overlap_start: DateTime<Utc>,
    /// End of the overlapping period.
    pub overlap_end: DateTime<Utc>,
    /// Duration of the overlap.
    pub overlap_minutes: i64,
}

// ============================================================================
// Voice Scheduling Outcome
// ============================================================================

/// Overall status of a processed transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Candidates were evaluated; see accepted/rejected.
    Processed,
    /// The transcript does not ask for a booking.
    NotAScheduleCommand,
    /// A booking was asked for but no time could be resolved.
    NoTimeFound,
    /// No property in the transcript or the request.
    MissingProperty,
    /// No agent in the transcript, on the property, or configured.
    MissingAgent,
}

/// Why a candidate was not booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// The agent is already booked in that slot.
    #[serde(rename_all = "camelCase")]
    Conflict { conflicting_entry_id: String },
    /// Only a day was given ("Wednesday").
    NoTimeOfDay,
    /// The slot starts before the reference instant.
    InPast,
    /// More candidates than one request may book.
    TooManyCandidates,
    /// The booking could not be written; nothing was reserved.
    NotSaved,
}

impl RejectionReason {
    /// Phrase used in outcome messages, after the candidate label.
    pub fn describe(&self) -> &'static str {
        match self {
            RejectionReason::Conflict { .. } => "conflicts with an existing booking",
            RejectionReason::NoTimeOfDay => "has no time of day",
            RejectionReason::InPast => "is in the past",
            RejectionReason::TooManyCandidates => "exceeds the number of showings one request may book",
            RejectionReason::NotSaved => "could not be saved; please try again",
        }
    }
}

/// A candidate that was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedCandidate {
    /// Spoken label, e.g. "Tuesday 3pm"
    pub label: String,
    pub entry: ScheduleEntry,
}

/// A candidate that was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCandidate {
    /// Spoken label, e.g. "Wednesday 10am"
    pub label: String,
    pub range: TimeRange,
    pub granularity: Granularity,
    #[serde(flatten)]
    pub reason: RejectionReason,
}

/// Everything the interpreter decided about one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutcome {
    pub status: OutcomeStatus,
    /// Human-readable summary of the outcome
    pub message: String,
    pub intent: SchedulingIntent,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<PropertyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub accepted: Vec<AcceptedCandidate>,
    pub rejected: Vec<RejectedCandidate>,
    /// Time fragments that could not be resolved
    pub diagnostics: Vec<UnresolvedFragment>,
}

impl SchedulingOutcome {
    /// An outcome that evaluated no candidates.
    pub fn early(
        status: OutcomeStatus,
        message: impl Into<String>,
        intent: SchedulingIntent,
        confidence: f32,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            intent,
            confidence,
            property_id: None,
            agent_id: None,
            accepted: Vec::new(),
            rejected: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Committed entries.
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.accepted.iter().map(|a| a.entry.clone()).collect()
    }

    /// True when some but not all candidates were booked.
    pub fn is_partial(&self) -> bool {
        !self.accepted.is_empty() && !self.rejected.is_empty()
    }
}
