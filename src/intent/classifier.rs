//! Keyword and phrase scoring classifier.
//!
//! Every label owns a keyword pattern (1 point per hit) and a phrase pattern
//! (2 points per hit). The best-scoring label wins; equal scores go to the
//! label that comes first in the domain's tie-priority order. Confidence is
//! the winner's share of all points, damped when the winner has fewer than
//! two points of evidence.

use std::sync::LazyLock;

use regex::Regex;

use super::types::*;

const KEYWORD_WEIGHT: f32 = 1.0;
const PHRASE_WEIGHT: f32 = 2.0;
/// Evidence at or above this many points is not damped.
const SATURATION: f32 = 2.0;

// ============================================================================
// Classifier
// ============================================================================

/// Deterministic rule-based classifier for feedback and scheduling text.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Below this confidence the domain fallback label is returned
    confidence_threshold: f32,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Create a classifier with the default threshold of 0.4.
    pub fn new() -> Self {
        Self {
            confidence_threshold: 0.4,
        }
    }

    /// Create a classifier with a custom confidence threshold.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            confidence_threshold: threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Classify `text` against the label set of `domain`.
    pub fn classify(&self, text: &str, domain: Domain) -> Classification {
        let text = text.to_lowercase();

        match domain {
            Domain::Feedback => self.decide(
                score(&text, &FEEDBACK_RULES),
                Label::Feedback(FeedbackCategory::General),
                Label::Feedback,
            ),
            Domain::Scheduling => self.decide(
                score(&text, &SCHEDULING_RULES),
                Label::Scheduling(SchedulingIntent::Unknown),
                Label::Scheduling,
            ),
        }
    }

    /// Feedback category of an answer, `General` when unclear.
    pub fn feedback_category(&self, text: &str) -> FeedbackCategory {
        self.classify(text, Domain::Feedback)
            .category()
            .unwrap_or(FeedbackCategory::General)
    }

    /// Scheduling intent of a transcript, `Unknown` when unclear.
    pub fn scheduling_intent(&self, text: &str) -> SchedulingIntent {
        self.classify(text, Domain::Scheduling)
            .intent()
            .unwrap_or(SchedulingIntent::Unknown)
    }

    fn decide<L: Copy>(
        &self,
        scores: Vec<(L, f32)>,
        fallback: Label,
        wrap: fn(L) -> Label,
    ) -> Classification {
        let total: f32 = scores.iter().map(|(_, s)| s).sum();

        // Strictly greater keeps the earlier (higher priority) label on ties.
        let mut best: Option<(L, f32)> = None;
        for &(label, s) in &scores {
            if s > 0.0 && best.map_or(true, |(_, b)| s > b) {
                best = Some((label, s));
            }
        }

        let scored = scores
            .iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|&(label, score)| ScoredLabel {
                label: wrap(label),
                score,
            })
            .collect();

        let Some((label, best_score)) = best else {
            return Classification::fallback(fallback, 0.0).with_scores(scored);
        };

        let confidence = (best_score / total) * (best_score / SATURATION).min(1.0);
        let result = if confidence < self.confidence_threshold {
            Classification::fallback(fallback, confidence)
        } else {
            Classification::new(wrap(label), confidence)
        };

        tracing::trace!(
            label = %result.label,
            confidence = result.confidence,
            fallback = result.is_fallback,
            "Classified text"
        );

        result.with_scores(scored)
    }
}

// ============================================================================
// Scoring Rules
// ============================================================================

struct Rule<L> {
    label: L,
    keywords: Regex,
    phrases: Regex,
}

fn rule<L>(label: L, keywords: &str, phrases: &str) -> Rule<L> {
    Rule {
        label,
        keywords: Regex::new(keywords).expect("Invalid regex"),
        phrases: Regex::new(phrases).expect("Invalid regex"),
    }
}

fn score<L: Copy>(text: &str, rules: &[Rule<L>]) -> Vec<(L, f32)> {
    rules
        .iter()
        .map(|r| {
            let keywords = r.keywords.find_iter(text).count() as f32;
            let phrases = r.phrases.find_iter(text).count() as f32;
            (r.label, keywords * KEYWORD_WEIGHT + phrases * PHRASE_WEIGHT)
        })
        .collect()
}

// Rules are listed in tie-priority order.
static FEEDBACK_RULES: LazyLock<Vec<Rule<FeedbackCategory>>> = LazyLock::new(|| {
    vec![
        rule(
            FeedbackCategory::Price,
            r"\b(?:rent|rents|price|prices|pricing|priced|pricey|cost|costs|costly|expensive|cheap|cheaper|afford|affordable|budget|fees?|deposit|overpriced|utilities|money)\b",
            r"(?:too\s+(?:high|much|steep)|per\s+month|a\s+month|value\s+for\s+(?:the\s+)?money|out\s+of\s+(?:my|our)\s+(?:price\s+)?range|\$\s?\d+)",
        ),
        rule(
            FeedbackCategory::Size,
            r"\b(?:size|small|tiny|cramped|spacious|big|bigger|large|larger|roomy|bedrooms?|bathrooms?|closets?|footage|layout|space|rooms?)\b",
            r"(?:too\s+(?:small|big|tight)|square\s+(?:feet|foot|footage|meters)|sq\.?\s*ft|not\s+enough\s+(?:space|room))",
        ),
        rule(
            FeedbackCategory::Location,
            r"\b(?:location|located|area|neighbou?rhood|commute|transit|downtown|schools?|shops|shopping|quiet|noisy|noise|safe|safety|traffic|walkable|distance|nearby|street|bus|train|subway|highway)\b",
            r"(?:close\s+to|far\s+from|walking\s+distance|near\s+(?:the|my|work))",
        ),
        rule(
            FeedbackCategory::Amenities,
            r"\b(?:amenity|amenities|pool|gym|parking|garage|laundry|washer|dryer|dishwasher|appliances?|kitchen|balcony|patio|yard|garden|heating|pets?|storage|elevator|wifi|internet|furnished|fireplace)\b",
            r"(?:air\s+condition(?:ing|er)|in[\s-]unit\s+laundry|pet[\s-]friendly|washer\s+and\s+dryer)",
        ),
        rule(
            FeedbackCategory::Comparison,
            r"\b(?:compare|compared|comparison|versus|vs|alternatives?|elsewhere|competitors?)\b",
            r"(?:better\s+than|worse\s+than|cheaper\s+than|bigger\s+than|similar\s+to|other\s+(?:places?|propert(?:y|ies)|units?|apartments?|listings?)|the\s+one\s+we\s+saw|also\s+looking)",
        ),
        rule(
            FeedbackCategory::Suggestions,
            r"\b(?:suggest|suggestion|suggestions|recommend|improve|improvement|should|could|wish|prefer|fix|update|renovate|repaint|upgrade)\b",
            r"(?:it\s+would\s+be\s+(?:nice|great|better)|you\s+should|could\s+use|would\s+(?:like|love)\s+to\s+see|needs?\s+(?:a|an|some|to)\b)",
        ),
    ]
});

static SCHEDULING_RULES: LazyLock<Vec<Rule<SchedulingIntent>>> = LazyLock::new(|| {
    vec![
        rule(
            SchedulingIntent::Cancel,
            r"\b(?:cancell?ed|cancell?ing|cancellation|unbook|scrap)\b",
            r"(?:\bcancel\b|call\s+off|remove\s+(?:the|my)|delete\s+(?:the|my)|(?:can't|cannot|can\s+not)\s+make|no\s+longer)",
        ),
        rule(
            SchedulingIntent::Book,
            r"\b(?:showings?|viewings?|tours?|visits?|appointments?|slots?)\b",
            r"\b(?:book|booking|schedule|scheduling|arrange|reserve|set\s+up|pencil\s+in|line\s+up)\b",
        ),
        rule(
            SchedulingIntent::Query,
            r"\b(?:agenda|availability|available|free|calendar|when)\b",
            r"(?:what'?s\s+on|what\s+(?:is|are|do)\b|do\s+(?:i|we)\s+have|any\s+(?:showings|appointments|bookings)|am\s+i\s+free|check\s+(?:my|the)|list\s+(?:my|the)|show\s+me)",
        ),
    ]
});
