//! Types for feedback interview sessions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::FeedbackCategory;
use crate::storage::{LeadId, PropertyId};

use super::graph::{Question, QuestionId};

/// Interview session id (UUID v4).
pub type SessionId = String;

// ============================================================================
// Interview Session
// ============================================================================

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Complete,
}

/// One prospect's run through a question graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: SessionId,
    pub lead_id: LeadId,
    pub property_id: PropertyId,
    pub session_type: String,
    /// Questions already answered, in order
    pub asked: Vec<QuestionId>,
    /// Question awaiting an answer; `None` once complete
    pub current_question_id: Option<QuestionId>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl InterviewSession {
    /// Start a session at `first_question`; complete at once when there is none.
    pub fn new(
        lead_id: LeadId,
        property_id: PropertyId,
        session_type: impl Into<String>,
        first_question: Option<QuestionId>,
    ) -> Self {
        let now = Utc::now();
        let status = if first_question.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Complete
        };

        Self {
            id: Uuid::new_v4().to_string(),
            lead_id,
            property_id,
            session_type: session_type.into(),
            asked: Vec::new(),
            current_question_id: first_question,
            completed_at: (status == SessionStatus::Complete).then_some(now),
            status,
            created_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    /// The state after answering the current question and moving to `next`.
    pub fn advanced(&self, next: Option<QuestionId>) -> Self {
        let mut session = self.clone();
        if let Some(answered) = session.current_question_id.take() {
            session.asked.push(answered);
        }
        if next.is_none() {
            session.status = SessionStatus::Complete;
            session.completed_at = Some(Utc::now());
        }
        session.current_question_id = next;
        session
    }
}

// ============================================================================
// Response
// ============================================================================

/// How an answer was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMethod {
    #[default]
    Text,
    Choice,
    Voice,
}

/// An answer to one question. Never edited once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub session_id: SessionId,
    pub property_id: PropertyId,
    pub question_id: QuestionId,
    pub response_method: ResponseMethod,
    /// Raw answer value (the option for choice questions)
    pub response_value: String,
    /// Free-text elaboration, e.g. a voice transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    /// Category assigned by the classifier
    pub category: FeedbackCategory,
    pub confidence: f32,
    /// Set when the classifier fell back to `general`
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
}

impl Response {
    /// The text that summaries are built from.
    pub fn text(&self) -> &str {
        match self.response_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => self.response_value.trim(),
        }
    }
}

// ============================================================================
// Category Summary
// ============================================================================

/// Aggregated feedback for one `(property, category)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub property_id: PropertyId,
    pub category: FeedbackCategory,
    pub summary_text: String,
    /// Set by a human edit; automatic regeneration stops until reset
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    /// Responses backing this summary, in arrival order
    pub responses: Vec<Response>,
    pub updated_at: DateTime<Utc>,
}

impl CategorySummary {
    pub fn new(property_id: PropertyId, category: FeedbackCategory) -> Self {
        Self {
            property_id,
            category,
            summary_text: String::new(),
            is_edited: false,
            edited_by: None,
            responses: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Engine Results
// ============================================================================

/// Result of starting a session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session: InterviewSession,
    /// `None` when the session type has no questions
    pub first_question: Option<Question>,
}

/// A response to record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    #[serde(default)]
    pub response_method: ResponseMethod,
    pub response_value: String,
    #[serde(default)]
    pub response_text: Option<String>,
}

/// What happens after a response was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub session_id: SessionId,
    /// The stored response, with its category
    pub response: Response,
    /// Next question, `None` once complete
    pub next_question: Option<Question>,
    pub is_complete: bool,
    /// Summary of the response's category after this response
    pub updated_summary: CategorySummary,
    /// On completion: every summary this session contributed to
    pub summaries: Vec<CategorySummary>,
}
