//! Intake: natural-language intake for a rental CRM.
//!
//! Two engines over one storage collaborator:
//! - adaptive feedback interviews that branch on answers and keep
//!   per-category summaries of what prospects said
//! - voice-command scheduling that turns a transcript into conflict-checked
//!   showings, booking what it can and explaining the rest

pub mod api;
pub mod config;
pub mod error;
pub mod feedback;
pub mod intent;
pub mod schedule;
pub mod storage;
pub mod temporal;

pub use api::{create_combined_router, create_rest_router, ApiState, RestApiConfig};
pub use config::Config;
pub use error::{
    ConfigError, GraphError, IntakeError, Result, StateError, StorageError, ValidationError,
};
pub use feedback::{
    CategorySummary, FeedbackEngine, InterviewSession, NextStep, Question, QuestionBank,
    QuestionGraph, Response, ResponseMethod, SessionStart, SessionStatus, Summarizer,
    SubmitResponse,
};
pub use intent::{
    Classification, Classifier, Domain, FeedbackCategory, Label, SchedulingIntent,
};
pub use schedule::{
    detect_conflicts, has_conflict, Booking, EntrySource, OutcomeStatus, RejectionReason,
    ScheduleEntry, SchedulingOutcome, VoiceScheduler,
};
pub use storage::{create_store, AgentId, IntakeStore, Lead, LeadId, MemoryStore, Property, PropertyId};
pub use temporal::{Resolution, TimeRange, TimeResolver, UnresolvedFragment};
