//! Output formatting for CLI commands.
//!
//! This module handles formatting output as either JSON or human-readable text.

use chrono::FixedOffset;
use intake::schedule::SchedulingOutcome;
use intake::temporal::{range_label, Resolution};
use intake::Classification;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a classification.
pub fn print_classification(result: &Classification, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }

    println!("Label: {}", result.label);
    println!("Confidence: {:.2}", result.confidence);
    if result.is_fallback {
        println!("Below threshold: needs human review");
    }
    for scored in &result.scores {
        println!("  {:<12} {:.1}", scored.label.as_str(), scored.score);
    }
    Ok(())
}

/// Print resolved ranges and dropped fragments.
pub fn print_resolution(result: &Resolution, tz: &FixedOffset, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }

    if result.ranges.is_empty() {
        println!("No times resolved.");
    }
    for (i, resolved) in result.ranges.iter().enumerate() {
        println!(
            "{}. {} ({} to {}) from \"{}\"",
            i + 1,
            range_label(resolved, tz),
            resolved.range.start.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            resolved.range.end.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            resolved.text
        );
    }
    for fragment in &result.unresolved {
        println!("Unresolved: \"{}\" ({})", fragment.text, fragment.reason.describe());
    }
    Ok(())
}

/// Print a voice scheduling outcome.
pub fn print_outcome(result: &SchedulingOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }

    println!("{}", result.message);
    for accepted in &result.accepted {
        println!(
            "  booked   {} (agent {}, entry {})",
            accepted.label, accepted.entry.agent_id, accepted.entry.id
        );
    }
    for rejected in &result.rejected {
        println!("  rejected {} ({})", rejected.label, rejected.reason.describe());
    }
    Ok(())
}
