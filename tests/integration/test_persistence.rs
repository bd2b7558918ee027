//! Store persistence across restarts.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use intake::{
    create_store, Config, FeedbackCategory, FeedbackEngine, IntakeStore, ResponseMethod,
    SubmitResponse, TimeRange, VoiceScheduler,
};
use tempfile::TempDir;

const SEED: &str = r#"{
    "leads": [{ "id": 1, "name": "Dana", "email": "dana@example.com" }],
    "properties": [{ "id": 7, "name": "12 Elm St", "agentId": 3 }]
}"#;

fn config(dir: &TempDir) -> Config {
    let seed_path = dir.path().join("seed.json");
    std::fs::write(&seed_path, SEED).unwrap();

    let mut config = Config::default();
    config.storage.data_dir = Some(dir.path().join("data").to_string_lossy().into_owned());
    config.storage.seed_file = Some(seed_path.to_string_lossy().into_owned());
    config
}

#[tokio::test]
async fn test_seed_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&config(&dir)).await.unwrap();

    let lead = store.get_lead(1).await.unwrap().unwrap();
    assert_eq!(lead.email.as_deref(), Some("dana@example.com"));
    let property = store.get_property(7).await.unwrap().unwrap();
    assert_eq!(property.agent_id, Some(3));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let (session_id, entry_id) = {
        let store = Arc::new(create_store(&config).await.unwrap());
        let engine = FeedbackEngine::new(store.clone());
        let scheduler = VoiceScheduler::new(store.clone());

        let start = engine.start_session(1, 7, "quick_pulse").await.unwrap();
        let session_id = start.session.id.clone();
        engine
            .submit_response(SubmitResponse {
                session_id: session_id.clone(),
                question_id: "rating".to_string(),
                response_method: ResponseMethod::Voice,
                response_value: "poor".to_string(),
                response_text: Some("honestly it was poor, the rent is too high".to_string()),
            })
            .await
            .unwrap();
        engine
            .update_summary(7, FeedbackCategory::Price, "Too expensive", "curator-1")
            .await
            .unwrap();

        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 17, 10, 30, 0).unwrap(),
        )
        .unwrap();
        let booking = scheduler.book_manual(3, 7, range).await.unwrap();
        let intake::Booking::Committed(entry) = booking else {
            panic!("slot should be free");
        };

        (session_id, entry.id)
    };

    let reopened = Arc::new(create_store(&config).await.unwrap());

    let session = reopened.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.current_question_id.as_deref(), Some("issue"));
    assert!(!session.is_complete());

    let responses = reopened.session_responses(&session_id).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response_method, ResponseMethod::Voice);

    let summary = reopened
        .get_summary(7, FeedbackCategory::Price)
        .await
        .unwrap()
        .unwrap();
    assert!(summary.is_edited);
    assert_eq!(summary.summary_text, "Too expensive");

    let entries = reopened.entries_for_agent(3).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, entry_id);

    // The restored calendar still rejects double bookings.
    let engine = FeedbackEngine::new(reopened.clone());
    let scheduler = VoiceScheduler::new(reopened);
    let outcome = scheduler
        .process(
            "Book a showing Wednesday at 10am",
            Some(7),
            &Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert!(outcome.accepted.is_empty());

    let step = engine
        .submit_response(SubmitResponse {
            session_id,
            question_id: "issue".to_string(),
            response_method: ResponseMethod::Text,
            response_value: "the rent".to_string(),
            response_text: None,
        })
        .await
        .unwrap();
    assert!(step.is_complete);
}
