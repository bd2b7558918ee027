//! Error types for the intake engines.
//!
//! Only malformed input, state conflicts and infrastructure faults are
//! errors. Low-confidence classification, unresolved time fragments and
//! rejected booking candidates are ordinary values.

use thiserror::Error;

/// Main error type for intake operations.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State conflict: {0}")]
    State(#[from] StateError),

    #[error("Question graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntakeError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::Config(_) => "config_error",
            IntakeError::Storage(_) => "storage_error",
            IntakeError::Validation(e) => match e {
                ValidationError::MissingField(_) => "missing_field",
                ValidationError::InvalidReference { .. } => "invalid_reference",
                ValidationError::InvalidValue(_) => "invalid_value",
                ValidationError::UnknownSessionType(_) => "unknown_session_type",
                ValidationError::InvalidRange(_) => "invalid_range",
                ValidationError::MalformedBody(_) => "malformed_body",
            },
            IntakeError::State(e) => match e {
                StateError::SessionNotFound(_) => "session_not_found",
                StateError::SessionAlreadyComplete(_) => "session_already_complete",
                StateError::OutOfOrderResponse { .. } => "out_of_order_response",
                StateError::SessionBusy(_) => "session_busy",
            },
            IntakeError::Graph(_) => "invalid_question_graph",
            IntakeError::Io(_) => "io_error",
            IntakeError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the caller can fix the problem by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, IntakeError::Validation(_) | IntakeError::State(_))
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt persisted data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed input, rejected before any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown {kind}: {id}")]
    InvalidReference { kind: &'static str, id: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown session type: {0}")]
    UnknownSessionType(String),

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    /// Shorthand for an unknown id of the given kind.
    pub fn reference(kind: &'static str, id: impl ToString) -> Self {
        ValidationError::InvalidReference {
            kind,
            id: id.to_string(),
        }
    }
}

/// Interview session state conflicts. The session is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already complete: {0}")]
    SessionAlreadyComplete(String),

    #[error("Out of order response for session {session_id}: expected question {expected:?}, received {received}")]
    OutOfOrderResponse {
        session_id: String,
        expected: Option<String>,
        received: String,
    },

    #[error("Another response is being recorded for session {0}")]
    SessionBusy(String),
}

/// Invalid question graph data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Start question {0} is not defined")]
    MissingStart(String),

    #[error("Question {from} points at undefined question {target}")]
    UnknownTarget { from: String, target: String },

    #[error("Question {0} is defined more than once")]
    DuplicateQuestion(String),

    #[error("Question graph contains a cycle through {0}")]
    Cycle(String),
}

/// Result type alias for intake operations.
pub type Result<T> = std::result::Result<T, IntakeError>;
