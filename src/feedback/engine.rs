//! The feedback interview engine.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, StateError, ValidationError};
use crate::intent::{Classifier, Domain, FeedbackCategory};
use crate::storage::{IntakeStore, LeadId, PropertyId};

use super::graph::QuestionBank;
use super::summary::Summarizer;
use super::types::{
    CategorySummary, InterviewSession, NextStep, Response, SessionId, SessionStart, SubmitResponse,
};

/// Runs interview sessions over a question bank.
///
/// Responses to one session are serialized: a submission that arrives while
/// another is being recorded for the same session fails with
/// [`StateError::SessionBusy`]. Different sessions never wait on each other.
pub struct FeedbackEngine<S: IntakeStore> {
    store: Arc<S>,
    bank: QuestionBank,
    classifier: Classifier,
    summarizer: Summarizer,
    session_locks: AsyncMutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl<S: IntakeStore> FeedbackEngine<S> {
    /// Create an engine with the built-in question bank.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            bank: QuestionBank::builtin(),
            classifier: Classifier::new(),
            summarizer: Summarizer::default(),
            session_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Create an engine from configuration, loading the question bank file if set.
    pub fn from_config(store: Arc<S>, config: &Config) -> Result<Self> {
        let bank = match config.question_bank() {
            Some(path) => QuestionBank::from_file(path)?,
            None => QuestionBank::builtin(),
        };

        Ok(Self::new(store)
            .with_bank(bank)
            .with_classifier(Classifier::with_threshold(config.classifier.confidence_threshold))
            .with_summarizer(Summarizer::new(config.feedback.summary_max_chars)))
    }

    pub fn with_bank(mut self, bank: QuestionBank) -> Self {
        self.bank = bank;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Start a session for a lead and property.
    ///
    /// The session is complete from the start when its graph has no questions.
    pub async fn start_session(
        &self,
        lead_id: LeadId,
        property_id: PropertyId,
        session_type: &str,
    ) -> Result<SessionStart> {
        let graph = self.bank.get(session_type)?;

        if self.store.get_lead(lead_id).await?.is_none() {
            return Err(ValidationError::reference("lead", lead_id).into());
        }
        if self.store.get_property(property_id).await?.is_none() {
            return Err(ValidationError::reference("property", property_id).into());
        }

        let first_question = graph.first().cloned();
        let session = InterviewSession::new(
            lead_id,
            property_id,
            session_type,
            first_question.as_ref().map(|q| q.id.clone()),
        );
        let session = self.store.create_session(session).await?;

        info!(
            session_id = %session.id,
            lead_id,
            property_id,
            "Started {} session",
            session_type
        );

        Ok(SessionStart {
            session,
            first_question,
        })
    }

    /// Record an answer to the session's pending question and advance.
    ///
    /// Every failure leaves the session as it was.
    pub async fn submit_response(&self, request: SubmitResponse) -> Result<NextStep> {
        let session_id = request.session_id.clone();
        let lock = self.session_lock(&session_id).await;

        let result = match lock.clone().try_lock_owned() {
            Ok(guard) => {
                let result = self.record_response(request).await;
                drop(guard);
                result
            }
            Err(_) => {
                warn!(session_id = %session_id, "Rejected concurrent submission");
                Err(StateError::SessionBusy(session_id.clone()).into())
            }
        };

        self.release_session_lock(&session_id, lock).await;
        result
    }

    async fn record_response(&self, request: SubmitResponse) -> Result<NextStep> {
        let session = self
            .store
            .get_session(&request.session_id)
            .await?
            .ok_or_else(|| StateError::SessionNotFound(request.session_id.clone()))?;

        if session.is_complete() {
            return Err(StateError::SessionAlreadyComplete(session.id).into());
        }
        if session.current_question_id.as_deref() != Some(request.question_id.as_str()) {
            return Err(StateError::OutOfOrderResponse {
                session_id: session.id,
                expected: session.current_question_id,
                received: request.question_id,
            }
            .into());
        }

        let graph = self.bank.get(&session.session_type)?;
        let question = graph
            .get(&request.question_id)
            .ok_or_else(|| ValidationError::reference("question", &request.question_id))?;
        let value = question.normalize_answer(&request.response_value)?;

        let mut response = Response {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            property_id: session.property_id,
            question_id: question.id.clone(),
            response_method: request.response_method,
            response_value: value,
            response_text: request.response_text.filter(|t| !t.trim().is_empty()),
            category: FeedbackCategory::General,
            confidence: 0.0,
            needs_review: true,
            created_at: Utc::now(),
        };

        let classification = self.classifier.classify(response.text(), Domain::Feedback);
        response.category = classification.category().unwrap_or(FeedbackCategory::General);
        response.confidence = classification.confidence;
        response.needs_review = classification.is_fallback;

        let next_question = question.next_id(&response.response_value).and_then(|id| graph.get(id)).cloned();
        let next_session = session.advanced(next_question.as_ref().map(|q| q.id.clone()));
        let is_complete = next_session.is_complete();

        debug!(
            session_id = %session.id,
            question = %question.id,
            category = %response.category,
            next = ?next_session.current_question_id,
            "Recorded response"
        );

        let updated_summary = self
            .store
            .commit_response(response.clone(), next_session, &self.summarizer)
            .await?;

        let summaries = if is_complete {
            let summaries = self.session_summaries(&session).await?;
            info!(
                session_id = %session.id,
                answered = session.asked.len() + 1,
                "Completed session"
            );
            summaries
        } else {
            Vec::new()
        };

        Ok(NextStep {
            session_id: session.id,
            response,
            next_question,
            is_complete,
            updated_summary,
            summaries,
        })
    }

    /// Summaries of every category this session's responses landed in.
    async fn session_summaries(&self, session: &InterviewSession) -> Result<Vec<CategorySummary>> {
        let categories: BTreeSet<FeedbackCategory> = self
            .store
            .session_responses(&session.id)
            .await?
            .iter()
            .map(|r| r.category)
            .collect();

        let mut summaries = Vec::with_capacity(categories.len());
        for category in categories {
            if let Some(summary) = self.store.get_summary(session.property_id, category).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    async fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        self.session_locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the session's table entry once no other submission holds it.
    async fn release_session_lock(&self, session_id: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        // One reference in the table, one in `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    /// Replace a category summary with curator text. Automatic regeneration
    /// stops for this pair until [`reset_summary`](Self::reset_summary).
    pub async fn update_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
        summary_text: &str,
        editor_id: &str,
    ) -> Result<CategorySummary> {
        if editor_id.trim().is_empty() {
            return Err(ValidationError::MissingField("editorId".to_string()).into());
        }
        if self.store.get_property(property_id).await?.is_none() {
            return Err(ValidationError::reference("property", property_id).into());
        }

        let summary = self
            .store
            .edit_summary(
                property_id,
                category,
                summary_text.to_string(),
                editor_id.to_string(),
                &self.summarizer,
            )
            .await?;

        info!(property_id, %category, editor = editor_id, "Summary edited");
        Ok(summary)
    }

    /// Drop a curator edit and regenerate from the backing responses.
    pub async fn reset_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
    ) -> Result<CategorySummary> {
        let summary = self
            .store
            .reset_summary(property_id, category, &self.summarizer)
            .await?
            .ok_or_else(|| {
                ValidationError::reference("summary", format!("{}/{}", property_id, category))
            })?;

        info!(property_id, %category, "Summary reset");
        Ok(summary)
    }

    pub async fn get_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
    ) -> Result<Option<CategorySummary>> {
        self.store.get_summary(property_id, category).await
    }

    pub async fn list_summaries(&self, property_id: PropertyId) -> Result<Vec<CategorySummary>> {
        self.store.list_summaries(property_id).await
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub async fn get_session(&self, session_id: &str) -> Result<InterviewSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| StateError::SessionNotFound(session_id.to_string()).into())
    }

    /// Responses of a session in the order they were given.
    pub async fn session_responses(&self, session_id: &str) -> Result<Vec<Response>> {
        self.get_session(session_id).await?;
        self.store.session_responses(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntakeError;
    use crate::feedback::{Question, QuestionGraph, ResponseMethod};
    use crate::storage::{Lead, MemoryStore, Property, SeedData};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_seed(SeedData {
            leads: vec![Lead::new(1, "Dana")],
            properties: vec![Property::new(7, "Elm St").with_agent(3)],
        }))
    }

    fn answer(session_id: &str, question_id: &str, value: &str) -> SubmitResponse {
        SubmitResponse {
            session_id: session_id.to_string(),
            question_id: question_id.to_string(),
            response_method: ResponseMethod::Text,
            response_value: value.to_string(),
            response_text: None,
        }
    }

    #[tokio::test]
    async fn test_start_session() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "property_feedback").await.unwrap();

        assert_eq!(start.first_question.as_ref().unwrap().id, "overall");
        assert_eq!(start.session.current_question_id.as_deref(), Some("overall"));
        assert!(!start.session.is_complete());
    }

    #[tokio::test]
    async fn test_start_session_rejects_unknown_references() {
        let engine = FeedbackEngine::new(store());

        let err = engine.start_session(99, 7, "property_feedback").await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::InvalidReference { kind: "lead", .. })
        ));

        let err = engine.start_session(1, 99, "property_feedback").await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::InvalidReference { kind: "property", .. })
        ));

        let err = engine.start_session(1, 7, "exit_survey").await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::UnknownSessionType(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_graph_starts_complete() {
        let mut bank = QuestionBank::builtin();
        bank.insert(QuestionGraph::empty("nothing"));
        let engine = FeedbackEngine::new(store()).with_bank(bank);

        let start = engine.start_session(1, 7, "nothing").await.unwrap();
        assert!(start.session.is_complete());
        assert!(start.first_question.is_none());
        assert!(start.session.current_question_id.is_none());
    }

    #[tokio::test]
    async fn test_out_of_order_leaves_session_unchanged() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "property_feedback").await.unwrap();
        let id = start.session.id.clone();

        let err = engine.submit_response(answer(&id, "price", "too high")).await.unwrap_err();
        assert!(matches!(err, IntakeError::State(StateError::OutOfOrderResponse { .. })));

        assert_eq!(engine.get_session(&id).await.unwrap(), start.session);
        assert!(engine.session_responses(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_choice_is_rejected() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "property_feedback").await.unwrap();
        let id = start.session.id.clone();

        let err = engine.submit_response(answer(&id, "overall", "meh")).await.unwrap_err();
        assert!(matches!(err, IntakeError::Validation(ValidationError::InvalidValue(_))));

        let err = engine.submit_response(answer(&id, "overall", "  ")).await.unwrap_err();
        assert!(matches!(err, IntakeError::Validation(ValidationError::MissingField(_))));

        assert_eq!(engine.get_session(&id).await.unwrap(), start.session);
    }

    #[tokio::test]
    async fn test_quick_pulse_ends_early() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
        let id = start.session.id.clone();

        let step = engine.submit_response(answer(&id, "rating", "Great")).await.unwrap();
        assert!(step.is_complete);
        assert!(step.next_question.is_none());
        assert_eq!(step.response.response_value, "great");
        assert_eq!(step.summaries.len(), 1);

        let err = engine.submit_response(answer(&id, "rating", "great")).await.unwrap_err();
        assert!(matches!(err, IntakeError::State(StateError::SessionAlreadyComplete(_))));

        let session = engine.get_session(&id).await.unwrap();
        assert_eq!(session.asked, vec!["rating".to_string()]);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_response_is_classified() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
        let id = start.session.id.clone();

        let step = engine.submit_response(answer(&id, "rating", "poor")).await.unwrap();
        assert_eq!(step.next_question.as_ref().unwrap().id, "issue");
        assert_eq!(step.response.category, FeedbackCategory::General);
        assert!(step.response.needs_review);

        let step = engine
            .submit_response(answer(&id, "issue", "the rent feels too high for this area"))
            .await
            .unwrap();
        assert!(step.is_complete);
        assert_eq!(step.response.category, FeedbackCategory::Price);
        assert!(!step.response.needs_review);
        assert_eq!(step.updated_summary.category, FeedbackCategory::Price);

        let categories: Vec<_> = step.summaries.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![FeedbackCategory::Price, FeedbackCategory::General]);
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_rejected() {
        let engine = FeedbackEngine::new(store());
        let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
        let id = start.session.id.clone();

        let lock = engine.session_lock(&id).await;
        let _held = lock.lock().await;

        let err = engine.submit_response(answer(&id, "rating", "great")).await.unwrap_err();
        assert!(matches!(err, IntakeError::State(StateError::SessionBusy(_))));
        assert_eq!(engine.session_locks.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_session_lock_table_is_pruned() {
        let engine = FeedbackEngine::new(store());

        for i in 0..100 {
            let err = engine
                .submit_response(answer(&format!("missing-{i}"), "rating", "great"))
                .await
                .unwrap_err();
            assert!(matches!(err, IntakeError::State(StateError::SessionNotFound(_))));
        }

        let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
        let id = start.session.id.clone();
        let err = engine.submit_response(answer(&id, "issue", "too pricey")).await.unwrap_err();
        assert!(matches!(err, IntakeError::State(StateError::OutOfOrderResponse { .. })));
        engine.submit_response(answer(&id, "rating", "poor")).await.unwrap();

        assert!(engine.session_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_reset_summary() {
        let engine = FeedbackEngine::new(store());

        let err = engine
            .update_summary(7, FeedbackCategory::Price, "High", " ")
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Validation(ValidationError::MissingField(_))));

        let edited = engine
            .update_summary(7, FeedbackCategory::Price, "Rent is high", "curator-1")
            .await
            .unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.edited_by.as_deref(), Some("curator-1"));

        let reset = engine.reset_summary(7, FeedbackCategory::Price).await.unwrap();
        assert!(!reset.is_edited);
        assert_eq!(reset.summary_text, "");

        let err = engine.reset_summary(7, FeedbackCategory::Size).await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::InvalidReference { kind: "summary", .. })
        ));
    }

    #[tokio::test]
    async fn test_custom_bank_choice_edges() {
        let graph = QuestionGraph::new(
            "tour",
            None,
            vec![
                Question::choice("again", "Would you tour again?", ["yes", "no"]).on("no", "why"),
                Question::free_text("why", "Why not?"),
            ],
        )
        .unwrap();
        let mut bank = QuestionBank::new();
        bank.insert(graph);
        let engine = FeedbackEngine::new(store()).with_bank(bank);

        let start = engine.start_session(1, 7, "tour").await.unwrap();
        let step = engine
            .submit_response(answer(&start.session.id, "again", "NO"))
            .await
            .unwrap();
        assert_eq!(step.next_question.unwrap().id, "why");
    }
}
