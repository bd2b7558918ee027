//! CLI command handlers for the intake binary.
//!
//! Every command runs locally against an in-process store; `voice` is a dry
//! run against a fresh store seeded from configuration.

mod output;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use intake::schedule::VoiceScheduler;
use intake::temporal::TimeResolver;
use intake::{Classifier, Config, Domain, MemoryStore};

/// Reference instant in the agency timezone: `at` if given, else now.
pub fn reference_time(at: Option<&str>, tz: FixedOffset) -> anyhow::Result<DateTime<FixedOffset>> {
    match at {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --at value: {}", raw))?
            .with_timezone(&tz)),
        None => Ok(Utc::now().with_timezone(&tz)),
    }
}

/// Classify a text and print the label.
pub fn run_classify(config: &Config, text: &str, domain: &str, json: bool) -> anyhow::Result<()> {
    let domain: Domain = domain.parse()?;
    let classifier = Classifier::with_threshold(config.classifier.confidence_threshold);
    output::print_classification(&classifier.classify(text, domain), json)
}

/// Resolve a time expression and print the ranges.
pub fn run_resolve(config: &Config, expression: &str, at: Option<&str>, json: bool) -> anyhow::Result<()> {
    let tz = config.scheduling.timezone()?;
    let reference = reference_time(at, tz)?;
    let resolver = TimeResolver::with_default_duration(chrono::Duration::minutes(i64::from(
        config.scheduling.default_duration_minutes,
    )));
    output::print_resolution(&resolver.resolve(expression, &reference), &tz, json)
}

/// Interpret a transcript against a fresh store and print the outcome.
pub async fn run_voice(
    config: &Config,
    transcript: &str,
    property_id: Option<i64>,
    at: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let tz = config.scheduling.timezone()?;
    let reference = reference_time(at, tz)?;

    let store = MemoryStore::new();
    if let Some(seed_file) = config.seed_file() {
        store.seed_from_file(&seed_file).await?;
    }

    let scheduler = VoiceScheduler::from_config(Arc::new(store), config);
    let outcome = scheduler.process(transcript, property_id, &reference).await?;
    output::print_outcome(&outcome, json)
}
