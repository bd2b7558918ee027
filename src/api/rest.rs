//! REST API router and configuration.

use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{
    agent_schedule_handler, classify_handler, create_schedule_handler, get_session_handler,
    health_handler, list_summaries_handler, reset_summary_handler, session_responses_handler,
    start_session_handler, submit_response_handler, update_summary_handler,
    voice_schedule_handler, ApiState,
};
use crate::config::ServerConfig;
use crate::storage::IntakeStore;

/// REST API configuration.
#[derive(Debug, Clone)]
pub struct RestApiConfig {
    /// Enable CORS.
    pub enable_cors: bool,
    /// API prefix (e.g., "/api/v1").
    pub prefix: String,
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            prefix: "/api/v1".to_string(),
        }
    }
}

impl From<&ServerConfig> for RestApiConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            enable_cors: server.enable_cors,
            prefix: server.api_prefix.clone(),
        }
    }
}

/// Create the REST API router.
///
/// Endpoints:
/// - POST /api/v1/feedback/start-session           - Start an interview
/// - POST /api/v1/feedback/submit-response         - Answer the pending question
/// - GET  /api/v1/feedback/sessions/:id            - Get a session
/// - GET  /api/v1/feedback/sessions/:id/responses  - A session's responses
/// - GET  /api/v1/feedback/summaries/:propertyId   - A property's summaries
/// - PUT  /api/v1/feedback/summaries               - Edit a summary
/// - POST /api/v1/feedback/summaries/reset         - Reset an edited summary
/// - POST /api/v1/schedules/voice-schedule         - Book from a transcript
/// - POST /api/v1/schedules                        - Book by hand
/// - GET  /api/v1/schedules/agent/:agentId         - An agent's entries
/// - POST /api/v1/classify                         - Classify a text
/// - GET  /api/v1/health                           - Liveness
pub fn create_rest_router<S: IntakeStore + 'static>(
    state: Arc<ApiState<S>>,
    config: &RestApiConfig,
) -> Router {
    let api_routes = Router::new()
        .route("/feedback/start-session", post(start_session_handler::<S>))
        .route("/feedback/submit-response", post(submit_response_handler::<S>))
        .route("/feedback/sessions/:id", get(get_session_handler::<S>))
        .route(
            "/feedback/sessions/:id/responses",
            get(session_responses_handler::<S>),
        )
        .route(
            "/feedback/summaries",
            axum::routing::put(update_summary_handler::<S>),
        )
        .route(
            "/feedback/summaries/:property_id",
            get(list_summaries_handler::<S>),
        )
        .route("/feedback/summaries/reset", post(reset_summary_handler::<S>))
        .route("/schedules", post(create_schedule_handler::<S>))
        .route("/schedules/voice-schedule", post(voice_schedule_handler::<S>))
        .route("/schedules/agent/:agent_id", get(agent_schedule_handler::<S>))
        .route("/classify", post(classify_handler::<S>))
        .route("/health", get(health_handler))
        .with_state(state);

    // Build the full router with prefix
    let router = Router::new().nest(&config.prefix, api_routes);

    // Add CORS if enabled
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_origin(Any);

        router.layer(cors)
    } else {
        router
    }
}

/// Create the REST API router plus the `/api` endpoint listing.
pub fn create_combined_router<S: IntakeStore + 'static>(
    state: Arc<ApiState<S>>,
    config: &RestApiConfig,
) -> Router {
    let rest_router = create_rest_router(state, config);

    let prefix = config.prefix.clone();
    let info_route = Router::new().route("/api", get(move || api_info_handler(prefix.clone())));

    rest_router.merge(info_route)
}

/// API info handler.
async fn api_info_handler(prefix: String) -> axum::Json<serde_json::Value> {
    let endpoint = |method: &str, path: &str, description: &str| {
        serde_json::json!({
            "method": method,
            "path": format!("{}{}", prefix, path),
            "description": description,
        })
    };

    axum::Json(serde_json::json!({
        "name": "Intake REST API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Adaptive feedback interviews and voice-command scheduling",
        "endpoints": {
            "start_session": endpoint("POST", "/feedback/start-session", "Start a feedback interview session"),
            "submit_response": endpoint("POST", "/feedback/submit-response", "Answer the pending question and get the next one"),
            "get_session": endpoint("GET", "/feedback/sessions/:id", "Get an interview session"),
            "session_responses": endpoint("GET", "/feedback/sessions/:id/responses", "List a session's responses in order"),
            "list_summaries": endpoint("GET", "/feedback/summaries/:propertyId", "List category summaries for a property"),
            "update_summary": endpoint("PUT", "/feedback/summaries", "Replace a summary with curator text"),
            "reset_summary": endpoint("POST", "/feedback/summaries/reset", "Drop a curator edit and regenerate"),
            "voice_schedule": endpoint("POST", "/schedules/voice-schedule", "Book showings from a spoken transcript"),
            "create_schedule": endpoint("POST", "/schedules", "Book a showing by hand"),
            "agent_schedule": endpoint("GET", "/schedules/agent/:agentId", "List an agent's entries and double bookings"),
            "classify": endpoint("POST", "/classify", "Classify feedback or a scheduling command"),
            "health": endpoint("GET", "/health", "Liveness check")
        }
    }))
}
