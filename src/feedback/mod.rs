//! Adaptive feedback interviews.
//!
//! A session walks a [`QuestionGraph`] one question at a time. Each answer is
//! classified into a [`FeedbackCategory`](crate::intent::FeedbackCategory) and
//! folded into that category's [`CategorySummary`] for the property, unless a
//! curator has edited the summary.
//!
//! ```ignore
//! let engine = FeedbackEngine::new(store);
//! let start = engine.start_session(lead_id, property_id, "property_feedback").await?;
//! let step = engine.submit_response(SubmitResponse {
//!     session_id: start.session.id.clone(),
//!     question_id: "overall".into(),
//!     response_method: ResponseMethod::Choice,
//!     response_value: "loved it".into(),
//!     response_text: None,
//! }).await?;
//! ```

mod engine;
mod graph;
mod summary;
mod types;

pub use engine::FeedbackEngine;
pub use graph::{Question, QuestionBank, QuestionGraph, QuestionId, QuestionKind};
pub use summary::{Summarizer, DEFAULT_SUMMARY_MAX_CHARS};
pub use types::*;
