//! Category summary regeneration.
//!
//! A summary is a deterministic aggregate of the responses backing it. Human
//! edits pin the text: `absorb` keeps collecting responses but leaves edited
//! text alone until `reset`.

use std::collections::HashSet;

use chrono::Utc;

use super::types::{CategorySummary, Response};

/// Default summary length limit, in characters.
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 600;

const ELLIPSIS: &str = "...";

/// Builds summary text from responses.
#[derive(Debug, Clone)]
pub struct Summarizer {
    max_chars: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_MAX_CHARS)
    }
}

impl Summarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Aggregate text for `responses`: the response count followed by the
    /// distinct answers in arrival order.
    pub fn summarize(&self, responses: &[Response]) -> String {
        if responses.is_empty() {
            return String::new();
        }

        let mut seen = HashSet::new();
        let distinct: Vec<&str> = responses
            .iter()
            .map(Response::text)
            .filter(|text| !text.is_empty() && seen.insert(text.to_lowercase()))
            .collect();

        let noun = if responses.len() == 1 { "response" } else { "responses" };
        let text = format!("{} {}: {}", responses.len(), noun, distinct.join("; "));
        self.truncate(text)
    }

    /// Add a response and regenerate unless a human edited the summary.
    pub fn absorb(&self, summary: &mut CategorySummary, response: Response) {
        summary.responses.push(response);
        if !summary.is_edited {
            summary.summary_text = self.summarize(&summary.responses);
        }
        summary.updated_at = Utc::now();
    }

    /// Replace the text with a human edit. Last write wins.
    pub fn edit(&self, summary: &mut CategorySummary, text: impl Into<String>, editor: impl Into<String>) {
        summary.summary_text = text.into();
        summary.is_edited = true;
        summary.edited_by = Some(editor.into());
        summary.updated_at = Utc::now();
    }

    /// Drop the human edit and regenerate from the backing responses.
    pub fn reset(&self, summary: &mut CategorySummary) {
        summary.is_edited = false;
        summary.edited_by = None;
        summary.summary_text = self.summarize(&summary.responses);
        summary.updated_at = Utc::now();
    }

    fn truncate(&self, text: String) -> String {
        if text.chars().count() <= self.max_chars {
            return text;
        }
        let keep = self.max_chars.saturating_sub(ELLIPSIS.len());
        let mut truncated: String = text.chars().take(keep).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    }
}
