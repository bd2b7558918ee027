//! The storage collaborator the intake engines are written against.

use async_trait::async_trait;

use crate::error::Result;
use crate::feedback::{CategorySummary, InterviewSession, Response, Summarizer};
use crate::intent::FeedbackCategory;
use crate::schedule::{Booking, ScheduleEntry};

use super::types::{AgentId, Lead, LeadId, Property, PropertyId};

/// Durable state for leads, properties, interview sessions, responses,
/// category summaries and schedule entries.
///
/// Implementations must make `commit_response` and `insert_entry_if_free`
/// indivisible: no reader may observe a response without its summary, and no
/// two concurrent inserts for one agent may both pass the conflict check.
#[async_trait]
pub trait IntakeStore: Send + Sync {
    // ========================================================================
    // CRM Records
    // ========================================================================

    async fn get_lead(&self, id: LeadId) -> Result<Option<Lead>>;

    async fn upsert_lead(&self, lead: Lead) -> Result<Lead>;

    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>>;

    async fn upsert_property(&self, property: Property) -> Result<Property>;

    // ========================================================================
    // Interview Sessions
    // ========================================================================

    /// Store a new session.
    async fn create_session(&self, session: InterviewSession) -> Result<InterviewSession>;

    async fn get_session(&self, id: &str) -> Result<Option<InterviewSession>>;

    /// Responses of a session in arrival order.
    async fn session_responses(&self, session_id: &str) -> Result<Vec<Response>>;

    /// Record `response`, replace the session with `session`, and fold the
    /// response into its category summary, as one unit.
    ///
    /// Returns the summary after the update.
    async fn commit_response(
        &self,
        response: Response,
        session: InterviewSession,
        summarizer: &Summarizer,
    ) -> Result<CategorySummary>;

    // ========================================================================
    // Category Summaries
    // ========================================================================

    async fn get_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
    ) -> Result<Option<CategorySummary>>;

    /// Summaries of a property, ordered by category.
    async fn list_summaries(&self, property_id: PropertyId) -> Result<Vec<CategorySummary>>;

    /// Apply a human edit, creating the summary if it does not exist.
    async fn edit_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
        text: String,
        editor: String,
        summarizer: &Summarizer,
    ) -> Result<CategorySummary>;

    /// Clear a human edit and regenerate. `None` when there is no summary.
    async fn reset_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
        summarizer: &Summarizer,
    ) -> Result<Option<CategorySummary>>;

    // ========================================================================
    // Schedule
    // ========================================================================

    /// An agent's entries ordered by start.
    async fn entries_for_agent(&self, agent_id: AgentId) -> Result<Vec<ScheduleEntry>>;

    /// Append `entry` unless it overlaps one of the agent's entries.
    async fn insert_entry_if_free(&self, entry: ScheduleEntry) -> Result<Booking>;
}
