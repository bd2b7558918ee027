//! HTTP API end to end through the router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use intake::storage::SeedData;
use intake::{
    create_combined_router, ApiState, Config, Lead, MemoryStore, Property, RestApiConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const MONDAY_MORNING: &str = "2024-01-15T09:00:00Z";

fn router() -> Router {
    let store = Arc::new(MemoryStore::with_seed(SeedData {
        leads: vec![Lead::new(1, "Dana")],
        properties: vec![Property::new(7, "12 Elm St").with_agent(3)],
    }));
    let state = Arc::new(ApiState::from_config(store, &Config::default()).unwrap());
    create_combined_router(state, &RestApiConfig::default())
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn start_session(router: &Router) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/api/v1/feedback/start-session",
        Some(json!({ "leadId": 1, "propertyId": 7, "sessionType": "quick_pulse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isComplete"], json!(false));
    assert_eq!(body["initialQuestions"][0]["id"], json!("rating"));
    body["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_interview_over_http() {
    let router = router();
    let session_id = start_session(&router).await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/submit-response",
        Some(json!({
            "sessionId": session_id,
            "questionId": "rating",
            "responseMethod": "text",
            "responseValue": "Poor"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isComplete"], json!(false));
    assert_eq!(body["nextQuestion"]["id"], json!("issue"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/submit-response",
        Some(json!({
            "sessionId": session_id,
            "questionId": "issue",
            "responseMethod": "voice",
            "responseValue": "the rent is way too high",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isComplete"], json!(true));
    assert_eq!(body["category"], json!("price"));
    assert_eq!(body["needsReview"], json!(false));
    assert!(body.get("nextQuestion").is_none());
    assert_eq!(body["summaries"].as_array().unwrap().len(), 2);

    let uri = format!("/api/v1/feedback/sessions/{}/responses", session_id);
    let (status, body) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(2));

    let (status, body) = send(&router, Method::GET, "/api/v1/feedback/summaries/7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summaries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_interview_errors() {
    let router = router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/start-session",
        Some(json!({ "leadId": 99, "propertyId": 7, "sessionType": "quick_pulse" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("invalid_reference"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/start-session",
        Some(json!({ "propertyId": 7, "sessionType": "quick_pulse" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("missing_field"));

    let session_id = start_session(&router).await;
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/submit-response",
        Some(json!({
            "sessionId": session_id,
            "questionId": "issue",
            "responseMethod": "text",
            "responseValue": "too small"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("out_of_order_response"));

    let (status, _) = send(&router, Method::GET, "/api/v1/feedback/sessions/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_use_error_shape() {
    let router = router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/feedback/submit-response")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], json!("malformed_body"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/submit-response",
        Some(json!({ "questionId": "rating", "responseValue": "great" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("malformed_body"));
    assert!(body["error"].as_str().unwrap().contains("sessionId"));
}

#[tokio::test]
async fn test_summary_edit_and_reset() {
    let router = router();

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/v1/feedback/summaries",
        Some(json!({ "propertyId": 7, "category": "price", "summaryText": "Rent too high" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("missing_field"));

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/v1/feedback/summaries",
        Some(json!({
            "propertyId": 7,
            "category": "price",
            "summaryText": "Rent too high",
            "editorId": "curator-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isEdited"], json!(true));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/feedback/summaries/reset",
        Some(json!({ "propertyId": 7, "category": "price" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isEdited"], json!(false));
}

#[tokio::test]
async fn test_voice_and_manual_scheduling() {
    let router = router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules/voice-schedule",
        Some(json!({
            "transcript": "Book a showing tomorrow at 3pm and Wednesday at 10am",
            "propertyId": 7,
            "referenceTime": MONDAY_MORNING
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("processed"));
    assert_eq!(body["intent"], json!("book"));
    assert_eq!(body["schedules"].as_array().unwrap().len(), 2);
    assert_eq!(body["message"], json!("Booked 2 showings: Tuesday 3pm, Wednesday 10am."));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules",
        Some(json!({
            "agentId": 3,
            "propertyId": 7,
            "start": "2024-01-16T15:15:00Z",
            "end": "2024-01-16T16:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("schedule_conflict"));
    assert_eq!(body["conflictingEntry"]["start"], json!("2024-01-16T15:00:00Z"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules",
        Some(json!({
            "agentId": 3,
            "propertyId": 7,
            "start": "2024-01-16T15:30:00Z",
            "end": "2024-01-16T16:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["source"], json!("manual"));

    let (status, body) = send(&router, Method::GET, "/api/v1/schedules/agent/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 3);
    assert!(body["conflicts"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules/voice-schedule",
        Some(json!({
            "transcript": "Book a showing Wednesday at 10am",
            "propertyId": 7,
            "referenceTime": MONDAY_MORNING
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["schedules"].as_array().unwrap().is_empty());
    assert_eq!(body["rejected"][0]["reason"], json!("conflict"));
}

#[tokio::test]
async fn test_voice_schedule_validation() {
    let router = router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules/voice-schedule",
        Some(json!({ "transcript": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("missing_field"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules/voice-schedule",
        Some(json!({
            "transcript": "Book a showing tomorrow at 3pm",
            "propertyId": 404,
            "referenceTime": MONDAY_MORNING
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("invalid_reference"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/schedules",
        Some(json!({
            "agentId": 3,
            "propertyId": 7,
            "start": "2024-01-16T16:00:00Z",
            "end": "2024-01-16T15:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("invalid_range"));
}

#[tokio::test]
async fn test_classify_health_and_listing() {
    let router = router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/classify",
        Some(json!({ "text": "cancel my showing on Friday", "domain": "scheduling" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], json!("cancel"));

    let (status, body) = send(&router, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = send(&router, Method::GET, "/api", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["endpoints"]["voice_schedule"]["path"],
        json!("/api/v1/schedules/voice-schedule")
    );
}
