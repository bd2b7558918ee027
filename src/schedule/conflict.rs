//! Schedule conflict checking.
//!
//! Two entries conflict when they belong to the same agent and their
//! half-open intervals overlap. Empty intervals never conflict.

use crate::storage::AgentId;
use crate::temporal::TimeRange;

use super::types::{ScheduleConflict, ScheduleEntry};

/// Whether `proposed` overlaps any of `agent_id`'s entries in `existing`.
pub fn has_conflict(agent_id: AgentId, proposed: &TimeRange, existing: &[ScheduleEntry]) -> bool {
    find_conflict(agent_id, proposed, existing).is_some()
}

/// First of `agent_id`'s entries that overlaps `proposed`. Single pass.
pub fn find_conflict<'a>(
    agent_id: AgentId,
    proposed: &TimeRange,
    existing: &'a [ScheduleEntry],
) -> Option<&'a ScheduleEntry> {
    existing
        .iter()
        .find(|entry| entry.agent_id == agent_id && entry.overlaps(proposed))
}

impl ScheduleConflict {
    /// Detect a double booking between two entries.
    pub fn detect(entry1: &ScheduleEntry, entry2: &ScheduleEntry) -> Option<Self> {
        if entry1.agent_id != entry2.agent_id || !entry1.overlaps(&entry2.range()) {
            return None;
        }

        let overlap_start = entry1.start.max(entry2.start);
        let overlap_end = entry1.end.min(entry2.end);

        Some(Self {
            agent_id: entry1.agent_id,
            entry1_id: entry1.id.clone(),
            entry2_id: entry2.id.clone(),
            overlap_start,
            overlap_end,
            overlap_minutes: (overlap_end - overlap_start).num_minutes(),
        })
    }
}

/// Audit a list of entries for double bookings, longest overlap first.
pub fn detect_conflicts(entries: &[ScheduleEntry]) -> Vec<ScheduleConflict> {
    let mut conflicts = Vec::new();

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            if let Some(conflict) = ScheduleConflict::detect(&entries[i], &entries[j]) {
                conflicts.push(conflict);
            }
        }
    }

    conflicts.sort_by(|a, b| b.overlap_minutes.cmp(&a.overlap_minutes));

    conflicts
}
