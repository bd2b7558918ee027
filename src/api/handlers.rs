//! REST API request handlers.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{IntakeError, Result, StateError, ValidationError};
use crate::feedback::{
    CategorySummary, FeedbackEngine, InterviewSession, Question, Response as FeedbackResponse,
    SubmitResponse,
};
use crate::intent::{Classification, Classifier, Domain, FeedbackCategory, SchedulingIntent};
use crate::schedule::{
    detect_conflicts, Booking, OutcomeStatus, RejectedCandidate, ScheduleConflict, ScheduleEntry,
    VoiceScheduler,
};
use crate::storage::{AgentId, IntakeStore, LeadId, PropertyId};
use crate::temporal::{TimeRange, UnresolvedFragment};

/// Application state shared across handlers.
pub struct ApiState<S: IntakeStore> {
    pub feedback: FeedbackEngine<S>,
    pub scheduler: VoiceScheduler<S>,
    pub classifier: Classifier,
    /// Agency wall clock used to interpret spoken times.
    pub timezone: FixedOffset,
}

impl<S: IntakeStore> ApiState<S> {
    pub fn new(
        feedback: FeedbackEngine<S>,
        scheduler: VoiceScheduler<S>,
        classifier: Classifier,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            feedback,
            scheduler,
            classifier,
            timezone,
        }
    }

    /// Build both engines over one store from configuration.
    pub fn from_config(store: Arc<S>, config: &Config) -> Result<Self> {
        Ok(Self::new(
            FeedbackEngine::from_config(store.clone(), config)?,
            VoiceScheduler::from_config(store, config),
            Classifier::with_threshold(config.classifier.confidence_threshold),
            config.scheduling.timezone()?,
        ))
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Start session request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    #[serde(default)]
    pub property_id: Option<PropertyId>,
    #[serde(default)]
    pub session_type: Option<String>,
}

/// Start session response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    /// The first question, or empty when the session type has none
    pub initial_questions: Vec<Question>,
    pub is_complete: bool,
    pub session: InterviewSession,
}

/// Submit response result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseBody {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<Question>,
    pub is_complete: bool,
    pub category: FeedbackCategory,
    pub confidence: f32,
    pub needs_review: bool,
    /// Summary of the response's category after this response
    pub summary: CategorySummary,
    /// Every summary the session contributed to, once complete
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<CategorySummary>,
}

/// Session responses (audit trail).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponsesBody {
    pub session_id: String,
    pub responses: Vec<FeedbackResponse>,
    pub total: usize,
}

/// Summaries of one property.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummariesBody {
    pub property_id: PropertyId,
    pub summaries: Vec<CategorySummary>,
}

/// Curator edit of a summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummaryRequest {
    pub property_id: PropertyId,
    pub category: FeedbackCategory,
    pub summary_text: String,
    #[serde(default)]
    pub editor_id: Option<String>,
}

/// Summary reset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummaryRequest {
    pub property_id: PropertyId,
    pub category: FeedbackCategory,
}

/// Voice schedule request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceScheduleRequest {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub property_id: Option<PropertyId>,
    /// Overrides "now"; RFC 3339
    #[serde(default)]
    pub reference_time: Option<DateTime<FixedOffset>>,
}

/// Voice schedule response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceScheduleResponse {
    pub message: String,
    pub status: OutcomeStatus,
    pub intent: SchedulingIntent,
    pub confidence: f32,
    /// Entries that were booked
    pub schedules: Vec<ScheduleEntry>,
    pub rejected: Vec<RejectedCandidate>,
    pub diagnostics: Vec<UnresolvedFragment>,
}

/// Manual booking request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub agent_id: AgentId,
    pub property_id: PropertyId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Manual booking refused because the slot is taken.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConflictResponse {
    pub error: String,
    pub code: String,
    pub conflicting_entry: ScheduleEntry,
}

/// An agent's schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentScheduleResponse {
    pub agent_id: AgentId,
    pub entries: Vec<ScheduleEntry>,
    /// Double bookings found in the stored entries
    pub conflicts: Vec<ScheduleConflict>,
}

/// Classify request.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
    #[serde(default = "default_domain")]
    pub domain: Domain,
}

fn default_domain() -> Domain {
    Domain::Feedback
}

/// Health response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// HTTP status for an error.
pub fn status_for(err: &IntakeError) -> StatusCode {
    match err {
        IntakeError::Validation(ValidationError::InvalidReference { .. }) => StatusCode::NOT_FOUND,
        IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
        IntakeError::State(StateError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
        IntakeError::State(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: IntakeError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
        .into_response()
}

fn missing(field: &str) -> Response {
    error_response(ValidationError::MissingField(field.to_string()).into())
}

/// JSON request body. Unparseable bodies get the usual error shape
/// instead of axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(error_response(
                ValidationError::MalformedBody(rejection.body_text()).into(),
            )),
        }
    }
}

// ============================================================================
// Feedback Handlers
// ============================================================================

/// POST /api/v1/feedback/start-session - Start an interview session.
pub async fn start_session_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<StartSessionRequest>,
) -> impl IntoResponse {
    let Some(lead_id) = request.lead_id else {
        return missing("leadId");
    };
    let Some(property_id) = request.property_id else {
        return missing("propertyId");
    };
    let Some(session_type) = request.session_type.filter(|t| !t.trim().is_empty()) else {
        return missing("sessionType");
    };

    match state
        .feedback
        .start_session(lead_id, property_id, session_type.trim())
        .await
    {
        Ok(start) => (
            StatusCode::CREATED,
            Json(StartSessionResponse {
                session_id: start.session.id.clone(),
                initial_questions: start.first_question.into_iter().collect(),
                is_complete: start.session.is_complete(),
                session: start.session,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/feedback/submit-response - Answer the pending question.
pub async fn submit_response_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<SubmitResponse>,
) -> impl IntoResponse {
    match state.feedback.submit_response(request).await {
        Ok(step) => (
            StatusCode::OK,
            Json(SubmitResponseBody {
                session_id: step.session_id,
                next_question: step.next_question,
                is_complete: step.is_complete,
                category: step.response.category,
                confidence: step.response.confidence,
                needs_review: step.response.needs_review,
                summary: step.updated_summary,
                summaries: step.summaries,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/feedback/sessions/:id - Get a session.
pub async fn get_session_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.feedback.get_session(&session_id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/feedback/sessions/:id/responses - List a session's responses.
pub async fn session_responses_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.feedback.session_responses(&session_id).await {
        Ok(responses) => (
            StatusCode::OK,
            Json(SessionResponsesBody {
                session_id,
                total: responses.len(),
                responses,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/feedback/summaries/:propertyId - List a property's summaries.
pub async fn list_summaries_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(property_id): Path<PropertyId>,
) -> impl IntoResponse {
    match state.feedback.list_summaries(property_id).await {
        Ok(summaries) => (
            StatusCode::OK,
            Json(SummariesBody {
                property_id,
                summaries,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/v1/feedback/summaries - Apply a curator edit.
pub async fn update_summary_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<UpdateSummaryRequest>,
) -> impl IntoResponse {
    let Some(editor_id) = request.editor_id else {
        return missing("editorId");
    };

    match state
        .feedback
        .update_summary(
            request.property_id,
            request.category,
            &request.summary_text,
            &editor_id,
        )
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/feedback/summaries/reset - Drop a curator edit.
pub async fn reset_summary_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<ResetSummaryRequest>,
) -> impl IntoResponse {
    match state
        .feedback
        .reset_summary(request.property_id, request.category)
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Schedule Handlers
// ============================================================================

/// POST /api/v1/schedules/voice-schedule - Book showings from a transcript.
pub async fn voice_schedule_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<VoiceScheduleRequest>,
) -> impl IntoResponse {
    if request.transcript.trim().is_empty() {
        return missing("transcript");
    }

    let reference = request
        .reference_time
        .map(|t| t.with_timezone(&state.timezone))
        .unwrap_or_else(|| state.now());

    match state
        .scheduler
        .process(&request.transcript, request.property_id, &reference)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(VoiceScheduleResponse {
                schedules: outcome.entries(),
                message: outcome.message,
                status: outcome.status,
                intent: outcome.intent,
                confidence: outcome.confidence,
                rejected: outcome.rejected,
                diagnostics: outcome.diagnostics,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/schedules - Book a showing by hand.
pub async fn create_schedule_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<CreateScheduleRequest>,
) -> impl IntoResponse {
    let range = match TimeRange::new(request.start, request.end) {
        Ok(range) => range,
        Err(e) => return error_response(e.into()),
    };

    match state
        .scheduler
        .book_manual(request.agent_id, request.property_id, range)
        .await
    {
        Ok(Booking::Committed(entry)) => (StatusCode::CREATED, Json(entry)).into_response(),
        Ok(Booking::Conflict { existing }) => (
            StatusCode::CONFLICT,
            Json(ScheduleConflictResponse {
                error: format!("Agent {} is already booked from {}", request.agent_id, existing.range()),
                code: "schedule_conflict".to_string(),
                conflicting_entry: existing,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/schedules/agent/:agentId - An agent's entries.
pub async fn agent_schedule_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(agent_id): Path<AgentId>,
) -> impl IntoResponse {
    match state.scheduler.entries_for_agent(agent_id).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(AgentScheduleResponse {
                agent_id,
                conflicts: detect_conflicts(&entries),
                entries,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// POST /api/v1/classify - Classify a text.
pub async fn classify_handler<S: IntakeStore>(
    State(state): State<Arc<ApiState<S>>>,
    JsonBody(request): JsonBody<ClassifyRequest>,
) -> Json<Classification> {
    Json(state.classifier.classify(&request.text, request.domain))
}

/// GET /api/v1/health - Liveness check.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
