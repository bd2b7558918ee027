//! Voice scheduling interpreter.
//!
//! Turns a transcript into zero or more committed showings. Each resolved
//! time range is a candidate judged on its own, so one bad slot never sinks
//! the others.

use std::sync::Arc;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::intent::{Classifier, Domain, SchedulingIntent};
use crate::storage::{AgentId, IntakeStore, PropertyId};
use crate::temporal::{range_label, Granularity, ResolvedRange, TimeRange, TimeResolver, UnresolvedFragment};

use super::types::{
    AcceptedCandidate, Booking, EntrySource, OutcomeStatus, RejectedCandidate, RejectionReason,
    ScheduleEntry, SchedulingOutcome,
};

/// Default cap on candidates booked from one transcript.
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

static PROPERTY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bproperty\s*(?:#|no\.?|number)?\s*(\d{1,18})\b").expect("Invalid regex"));

static AGENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bagent\s*(?:#|no\.?|number)?\s*(\d{1,18})\b").expect("Invalid regex"));

/// Interprets spoken scheduling commands against an agent calendar.
pub struct VoiceScheduler<S: IntakeStore> {
    store: Arc<S>,
    classifier: Classifier,
    resolver: TimeResolver,
    default_agent_id: Option<AgentId>,
    max_candidates: usize,
}

impl<S: IntakeStore> VoiceScheduler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            classifier: Classifier::new(),
            resolver: TimeResolver::new(),
            default_agent_id: None,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Create a scheduler with the configured threshold, duration and agent.
    pub fn from_config(store: Arc<S>, config: &Config) -> Self {
        let scheduling = &config.scheduling;
        let mut scheduler = Self::new(store)
            .with_classifier(Classifier::with_threshold(config.classifier.confidence_threshold))
            .with_resolver(TimeResolver::with_default_duration(Duration::minutes(
                i64::from(scheduling.default_duration_minutes),
            )))
            .with_max_candidates(scheduling.max_candidates);
        scheduler.default_agent_id = scheduling.default_agent_id;
        scheduler
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_resolver(mut self, resolver: TimeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Agent used when neither the transcript nor the property names one.
    pub fn with_default_agent(mut self, agent_id: AgentId) -> Self {
        self.default_agent_id = Some(agent_id);
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Interpret `transcript` and book every acceptable candidate.
    ///
    /// `reference` is "now" in the agency's timezone. `property_id` is used
    /// when the transcript does not name a property. Only an unknown property
    /// id and storage faults are errors; everything else is an outcome. A
    /// storage fault after some candidates were booked is reported as a
    /// rejection so the booked ones are not lost.
    pub async fn process<Tz: TimeZone>(
        &self,
        transcript: &str,
        property_id: Option<PropertyId>,
        reference: &DateTime<Tz>,
    ) -> Result<SchedulingOutcome>
    where
        Tz::Offset: std::fmt::Display,
    {
        let classification = self.classifier.classify(transcript, Domain::Scheduling);
        let intent = classification.intent().unwrap_or(SchedulingIntent::Unknown);
        let confidence = classification.confidence;

        if intent != SchedulingIntent::Book {
            let message = match intent {
                SchedulingIntent::Cancel => {
                    "This sounds like a cancellation; cancelling by voice is not supported, so nothing was changed."
                }
                SchedulingIntent::Query => {
                    "This sounds like a question about the schedule, not a booking request."
                }
                _ => "No booking request was recognised in the transcript.",
            };
            debug!(?intent, confidence, "Transcript is not a booking command");
            return Ok(SchedulingOutcome::early(
                OutcomeStatus::NotAScheduleCommand,
                message,
                intent,
                confidence,
            ));
        }

        let extracted = Extracted::from_transcript(transcript);
        let resolution = self.resolver.resolve(&extracted.remainder, reference);

        if resolution.is_empty() {
            let mut outcome = SchedulingOutcome::early(
                OutcomeStatus::NoTimeFound,
                with_diagnostics(
                    "No date or time was found in the request.".to_string(),
                    &resolution.unresolved,
                ),
                intent,
                confidence,
            );
            outcome.diagnostics = resolution.unresolved;
            return Ok(outcome);
        }

        let Some(property_id) = extracted.property_id.or(property_id) else {
            let mut outcome = SchedulingOutcome::early(
                OutcomeStatus::MissingProperty,
                "No property was given for the showing.",
                intent,
                confidence,
            );
            outcome.diagnostics = resolution.unresolved;
            return Ok(outcome);
        };

        let property = self
            .store
            .get_property(property_id)
            .await?
            .ok_or_else(|| ValidationError::reference("property", property_id))?;

        let Some(agent_id) = extracted
            .agent_id
            .or(property.agent_id)
            .or(self.default_agent_id)
        else {
            let mut outcome = SchedulingOutcome::early(
                OutcomeStatus::MissingAgent,
                format!("No agent is assigned to property {}.", property_id),
                intent,
                confidence,
            );
            outcome.property_id = Some(property_id);
            outcome.diagnostics = resolution.unresolved;
            return Ok(outcome);
        };

        let tz = reference.timezone();
        let now = reference.with_timezone(&Utc);
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut fault = None;

        for (i, candidate) in resolution.ranges.iter().enumerate() {
            let label = range_label(candidate, &tz);
            let reason = if i >= self.max_candidates {
                RejectionReason::TooManyCandidates
            } else if candidate.granularity == Granularity::Day {
                RejectionReason::NoTimeOfDay
            } else if candidate.range.start < now {
                RejectionReason::InPast
            } else {
                let entry = ScheduleEntry::new(agent_id, property_id, candidate.range, EntrySource::Voice);
                match self.store.insert_entry_if_free(entry).await {
                    Ok(Booking::Committed(entry)) => {
                        accepted.push(AcceptedCandidate { label, entry });
                        continue;
                    }
                    Ok(Booking::Conflict { existing }) => RejectionReason::Conflict {
                        conflicting_entry_id: existing.id,
                    },
                    Err(e) => {
                        warn!(agent_id, "Could not save {}: {}", label, e);
                        fault.get_or_insert(e);
                        RejectionReason::NotSaved
                    }
                }
            };

            rejected.push(reject(candidate, label, reason));
        }

        if let (true, Some(e)) = (accepted.is_empty(), fault) {
            return Err(e);
        }

        let message = with_diagnostics(
            outcome_message(resolution.ranges.len(), &accepted, &rejected),
            &resolution.unresolved,
        );

        info!(
            property_id,
            agent_id,
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Processed voice booking"
        );

        Ok(SchedulingOutcome {
            status: OutcomeStatus::Processed,
            message,
            intent,
            confidence,
            property_id: Some(property_id),
            agent_id: Some(agent_id),
            accepted,
            rejected,
            diagnostics: resolution.unresolved,
        })
    }

    /// Book a showing entered by hand, with the same conflict check as
    /// voice bookings.
    pub async fn book_manual(
        &self,
        agent_id: AgentId,
        property_id: PropertyId,
        range: TimeRange,
    ) -> Result<Booking> {
        if range.is_empty() {
            return Err(ValidationError::InvalidRange(format!("{} has no length", range)).into());
        }
        if self.store.get_property(property_id).await?.is_none() {
            return Err(ValidationError::reference("property", property_id).into());
        }

        let booking = self
            .store
            .insert_entry_if_free(ScheduleEntry::new(agent_id, property_id, range, EntrySource::Manual))
            .await?;

        match &booking {
            Booking::Committed(entry) => info!(agent_id, property_id, entry = %entry.id, "Booked {}", range),
            Booking::Conflict { existing } => {
                info!(agent_id, existing = %existing.id, "Manual booking {} conflicts", range)
            }
        }
        Ok(booking)
    }

    /// An agent's entries ordered by start.
    pub async fn entries_for_agent(&self, agent_id: AgentId) -> Result<Vec<ScheduleEntry>> {
        self.store.entries_for_agent(agent_id).await
    }
}

/// Ids pulled out of a transcript, and the transcript with their spans blanked.
struct Extracted {
    property_id: Option<PropertyId>,
    agent_id: Option<AgentId>,
    remainder: String,
}

impl Extracted {
    fn from_transcript(transcript: &str) -> Self {
        let mut remainder = transcript.to_string();
        let property_id = take_id(&PROPERTY_PATTERN, transcript, &mut remainder);
        let agent_id = take_id(&AGENT_PATTERN, transcript, &mut remainder);
        Self {
            property_id,
            agent_id,
            remainder,
        }
    }
}

/// First id matched by `pattern`; every match is blanked in `remainder` so
/// the number is not read as a time. Offsets are preserved.
fn take_id(pattern: &Regex, transcript: &str, remainder: &mut String) -> Option<i64> {
    let mut id = None;
    for caps in pattern.captures_iter(transcript) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if id.is_none() {
            id = number.as_str().parse().ok();
        }
        remainder.replace_range(whole.range(), &" ".repeat(whole.len()));
    }
    id
}

fn reject(candidate: &ResolvedRange, label: String, reason: RejectionReason) -> RejectedCandidate {
    RejectedCandidate {
        label,
        range: candidate.range,
        granularity: candidate.granularity,
        reason,
    }
}

fn outcome_message(
    requested: usize,
    accepted: &[AcceptedCandidate],
    rejected: &[RejectedCandidate],
) -> String {
    let noun = |n: usize| if n == 1 { "showing" } else { "showings" };

    if rejected.is_empty() {
        let labels: Vec<&str> = accepted.iter().map(|a| a.label.as_str()).collect();
        return format!(
            "Booked {} {}: {}.",
            accepted.len(),
            noun(accepted.len()),
            labels.join(", ")
        );
    }

    let reasons: Vec<String> = rejected
        .iter()
        .map(|r| format!("{} {}", r.label, r.reason.describe()))
        .collect();
    format!(
        "Booked {} of {} requested {}; {}.",
        accepted.len(),
        requested,
        noun(requested),
        reasons.join("; ")
    )
}

fn with_diagnostics(message: String, unresolved: &[UnresolvedFragment]) -> String {
    if unresolved.is_empty() {
        return message;
    }
    let notes: Vec<String> = unresolved
        .iter()
        .map(|f| format!("\"{}\" ({})", f.text, f.reason.describe()))
        .collect();
    format!("{} Could not use: {}.", message, notes.join(", "))
}
