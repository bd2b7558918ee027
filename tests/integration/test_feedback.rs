//! Feedback interview flows.

use std::sync::Arc;

use intake::{
    FeedbackCategory, FeedbackEngine, IntakeError, Lead, MemoryStore, Property, ResponseMethod,
    StateError, SubmitResponse,
};
use intake::storage::SeedData;

fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_seed(SeedData {
        leads: vec![Lead::new(1, "Dana"), Lead::new(2, "Sam")],
        properties: vec![Property::new(7, "12 Elm St").with_agent(3)],
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

/// Run a session to completion, answering each question from `answers`.
/// Returns the question ids in the order they were asked.
async fn run_session(
    engine: &FeedbackEngine<MemoryStore>,
    lead_id: i64,
    session_type: &str,
    answers: &[(&str, &str)],
) -> Vec<String> {
    let start = engine.start_session(lead_id, 7, session_type).await.unwrap();
    let session_id = start.session.id.clone();
    let mut current = start.first_question;
    let mut asked = Vec::new();

    for (expected, value) in answers {
        let question = current.expect("session ended early");
        assert_eq!(&question.id, expected);
        asked.push(question.id.clone());

        let step = engine
            .submit_response(answer(&session_id, &question.id, value))
            .await
            .unwrap();
        current = step.next_question;
    }

    assert!(current.is_none(), "session did not end");
    assert!(engine.get_session(&session_id).await.unwrap().is_complete());
    asked
}

const NOT_FOR_ME: &[(&str, &str)] = &[
    ("overall", "Not for me"),
    ("dealbreaker", "the rent is too expensive"),
    ("comparison", "yes"),
    ("comparison_detail", "the other apartments we saw were bigger than this"),
    ("suggestions", "you should repaint the hallway"),
];

#[tokio::test]
async fn test_branching_run_and_summaries() {
    let engine = FeedbackEngine::new(seeded_store());
    let asked = run_session(&engine, 1, "property_feedback", NOT_FOR_ME).await;

    assert_eq!(
        asked,
        vec!["overall", "dealbreaker", "comparison", "comparison_detail", "suggestions"]
    );

    let summaries = engine.list_summaries(7).await.unwrap();
    let categories: Vec<_> = summaries.iter().map(|s| s.category).collect();
    assert_eq!(
        categories,
        vec![
            FeedbackCategory::Price,
            FeedbackCategory::Comparison,
            FeedbackCategory::Suggestions,
            FeedbackCategory::General,
        ]
    );

    let general = engine
        .get_summary(7, FeedbackCategory::General)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(general.summary_text, "2 responses: not for me; yes");
    assert!(!general.is_edited);
}

#[tokio::test]
async fn test_completion_returns_session_summaries() {
    let engine = FeedbackEngine::new(seeded_store());
    let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
    let id = start.session.id;

    let step = engine.submit_response(answer(&id, "rating", "poor")).await.unwrap();
    assert!(!step.is_complete);
    assert!(step.summaries.is_empty());

    let step = engine
        .submit_response(answer(&id, "issue", "the bedrooms were tiny"))
        .await
        .unwrap();
    assert!(step.is_complete);
    let categories: Vec<_> = step.summaries.iter().map(|s| s.category).collect();
    assert_eq!(categories, vec![FeedbackCategory::Size, FeedbackCategory::General]);

    let responses = engine.session_responses(&id).await.unwrap();
    let questions: Vec<_> = responses.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(questions, vec!["rating", "issue"]);
}

#[tokio::test]
async fn test_identical_runs_are_deterministic() {
    let first = FeedbackEngine::new(seeded_store());
    let second = FeedbackEngine::new(seeded_store());

    let asked_first = run_session(&first, 1, "property_feedback", NOT_FOR_ME).await;
    let asked_second = run_session(&second, 1, "property_feedback", NOT_FOR_ME).await;
    assert_eq!(asked_first, asked_second);

    let texts = |summaries: Vec<intake::CategorySummary>| {
        summaries
            .into_iter()
            .map(|s| (s.category, s.summary_text))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        texts(first.list_summaries(7).await.unwrap()),
        texts(second.list_summaries(7).await.unwrap())
    );
}

#[tokio::test]
async fn test_human_edit_survives_new_responses() {
    let engine = FeedbackEngine::new(seeded_store());
    let price_answers = [
        "way too expensive for us",
        "the rent is high",
        "pricey but fair",
        "cheap rent for what you get",
    ];

    run_session(
        &engine,
        1,
        "quick_pulse",
        &[("rating", "poor"), ("issue", price_answers[0])],
    )
    .await;

    engine
        .update_summary(7, FeedbackCategory::Price, "Rent is the main objection", "curator-1")
        .await
        .unwrap();

    for text in &price_answers[1..] {
        run_session(&engine, 2, "quick_pulse", &[("rating", "poor"), ("issue", *text)]).await;

        let summary = engine
            .get_summary(7, FeedbackCategory::Price)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.summary_text, "Rent is the main objection");
        assert!(summary.is_edited);
        assert_eq!(summary.edited_by.as_deref(), Some("curator-1"));
    }

    let reset = engine.reset_summary(7, FeedbackCategory::Price).await.unwrap();
    assert!(!reset.is_edited);
    assert_eq!(reset.responses.len(), 4);
    assert_eq!(
        reset.summary_text,
        "4 responses: way too expensive for us; the rent is high; pricey but fair; cheap rent for what you get"
    );
}

#[tokio::test]
async fn test_concurrent_submissions_record_one_response() {
    let engine = Arc::new(FeedbackEngine::new(seeded_store()));
    let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
    let id = start.session.id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let id = id.clone();
            tokio::spawn(async move { engine.submit_response(answer(&id, "rating", "poor")).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(IntakeError::State(StateError::SessionBusy(_)))
            | Err(IntakeError::State(StateError::OutOfOrderResponse { .. })) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(engine.session_responses(&id).await.unwrap().len(), 1);
    assert_eq!(
        engine.get_session(&id).await.unwrap().current_question_id.as_deref(),
        Some("issue")
    );
}

#[tokio::test]
async fn test_unknown_session() {
    let engine = FeedbackEngine::new(seeded_store());
    let err = engine
        .submit_response(answer("missing", "rating", "great"))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::State(StateError::SessionNotFound(_))));
    assert!(engine.session_responses("missing").await.is_err());
}
