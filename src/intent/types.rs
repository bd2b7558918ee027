//! Types for intent and category classification.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Domain
// ============================================================================

/// Selects which label set a text is classified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Prospect feedback about a property.
    Feedback,
    /// Spoken scheduling commands.
    Scheduling,
}

impl FromStr for Domain {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feedback" => Ok(Domain::Feedback),
            "scheduling" | "schedule" => Ok(Domain::Scheduling),
            other => Err(ValidationError::InvalidValue(format!("unknown domain: {}", other))),
        }
    }
}

// ============================================================================
// Feedback Category
// ============================================================================

/// Feedback topics. `General` is the fallback for unclear answers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Price,
    Amenities,
    Location,
    Size,
    Comparison,
    Suggestions,
    General,
}

impl FeedbackCategory {
    /// All categories.
    pub const ALL: [FeedbackCategory; 7] = [
        FeedbackCategory::Price,
        FeedbackCategory::Amenities,
        FeedbackCategory::Location,
        FeedbackCategory::Size,
        FeedbackCategory::Comparison,
        FeedbackCategory::Suggestions,
        FeedbackCategory::General,
    ];

    /// Order used to break score ties: concrete, actionable topics first.
    pub const TIE_PRIORITY: [FeedbackCategory; 6] = [
        FeedbackCategory::Price,
        FeedbackCategory::Size,
        FeedbackCategory::Location,
        FeedbackCategory::Amenities,
        FeedbackCategory::Comparison,
        FeedbackCategory::Suggestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Amenities => "amenities",
            Self::Location => "location",
            Self::Size => "size",
            Self::Comparison => "comparison",
            Self::Suggestions => "suggestions",
            Self::General => "general",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidValue(format!("unknown category: {}", s)))
    }
}

// ============================================================================
// Scheduling Intent
// ============================================================================

/// What a scheduling transcript asks for. `Unknown` is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingIntent {
    Book,
    Cancel,
    Query,
    Unknown,
}

impl SchedulingIntent {
    /// Order used to break score ties. A cancellation outranks a booking
    /// so that "cancel the showing" never books one.
    pub const TIE_PRIORITY: [SchedulingIntent; 3] = [
        SchedulingIntent::Cancel,
        SchedulingIntent::Book,
        SchedulingIntent::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Cancel => "cancel",
            Self::Query => "query",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SchedulingIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Classification Result
// ============================================================================

/// A label from either domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Label {
    Feedback(FeedbackCategory),
    Scheduling(SchedulingIntent),
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Feedback(c) => c.as_str(),
            Label::Scheduling(i) => i.as_str(),
        }
    }

    /// The domain this label belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Label::Feedback(_) => Domain::Feedback,
            Label::Scheduling(_) => Domain::Scheduling,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw score of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredLabel {
    pub label: Label,
    pub score: f32,
}

/// Result of classifying a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Winning label, or the domain fallback
    pub label: Label,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
    /// True when confidence was below threshold and the fallback was used.
    /// Callers should treat this as "needs human review".
    pub is_fallback: bool,
    /// Every label that scored above zero, in tie-priority order
    pub scores: Vec<ScoredLabel>,
}

impl Classification {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            is_fallback: false,
            scores: Vec::new(),
        }
    }

    pub fn fallback(label: Label, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            is_fallback: true,
            scores: Vec::new(),
        }
    }

    pub fn with_scores(mut self, scores: Vec<ScoredLabel>) -> Self {
        self.scores = scores;
        self
    }

    /// The feedback category, if this is a feedback classification.
    pub fn category(&self) -> Option<FeedbackCategory> {
        match self.label {
            Label::Feedback(c) => Some(c),
            Label::Scheduling(_) => None,
        }
    }

    /// The scheduling intent, if this is a scheduling classification.
    pub fn intent(&self) -> Option<SchedulingIntent> {
        match self.label {
            Label::Scheduling(i) => Some(i),
            Label::Feedback(_) => None,
        }
    }
}
