//! Voice scheduling against a shared store.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use intake::schedule::ScheduleEntry;
use intake::storage::SeedData;
use intake::{
    detect_conflicts, AgentId, Booking, EntrySource, MemoryStore, OutcomeStatus, Property,
    RejectionReason, TimeRange, VoiceScheduler,
};

fn utc(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
}

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_seed(SeedData {
        leads: Vec::new(),
        properties: vec![
            Property::new(7, "12 Elm St").with_agent(3),
            Property::new(8, "4 Oak Ave").with_agent(3),
        ],
    }))
}

#[tokio::test]
async fn test_voice_booking_in_agency_timezone() {
    let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
    let reference = eastern.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    let scheduler = VoiceScheduler::new(store());

    let outcome = scheduler
        .process("Please book a showing tomorrow at 3pm", Some(7), &reference)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Processed);
    assert_eq!(outcome.message, "Booked 1 showing: Tuesday 3pm.");
    let entry = &outcome.accepted[0].entry;
    assert_eq!(entry.start, utc(16, 20, 0));
    assert_eq!(entry.end, utc(16, 20, 30));
    assert_eq!(entry.agent_id, 3);
}

#[tokio::test]
async fn test_bookings_across_properties_share_agent_calendar() {
    let scheduler = VoiceScheduler::new(store());
    let reference = utc(15, 9, 0);

    let first = scheduler
        .process("Book a showing tomorrow at 3pm", Some(7), &reference)
        .await
        .unwrap();
    assert_eq!(first.accepted.len(), 1);

    let second = scheduler
        .process("Book a showing tomorrow at 3pm", Some(8), &reference)
        .await
        .unwrap();
    assert!(second.accepted.is_empty());
    assert_eq!(
        second.rejected[0].reason,
        RejectionReason::Conflict {
            conflicting_entry_id: first.accepted[0].entry.id.clone()
        }
    );
}

#[tokio::test]
async fn test_concurrent_voice_bookings_commit_once() {
    let scheduler = Arc::new(VoiceScheduler::new(store()));
    let reference = utc(15, 9, 0);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let scheduler = scheduler.clone();
            let property = if i % 2 == 0 { 7 } else { 8 };
            tokio::spawn(async move {
                scheduler
                    .process("Book a showing Wednesday at 10am", Some(property), &reference)
                    .await
            })
        })
        .collect();

    let mut booked = 0;
    let mut conflicts = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        booked += outcome.accepted.len();
        conflicts += outcome
            .rejected
            .iter()
            .filter(|r| matches!(r.reason, RejectionReason::Conflict { .. }))
            .count();
    }

    assert_eq!(booked, 1);
    assert_eq!(conflicts, 11);

    let entries = scheduler.entries_for_agent(3).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(detect_conflicts(&entries).is_empty());
}

#[tokio::test]
async fn test_manual_and_voice_bookings_conflict() {
    let scheduler = VoiceScheduler::new(store());
    let reference = utc(15, 9, 0);

    let voice = scheduler
        .process("Set up a viewing Wednesday from 10 to noon", Some(7), &reference)
        .await
        .unwrap();
    assert_eq!(voice.accepted.len(), 1);

    let overlapping = TimeRange::new(utc(17, 11, 30), utc(17, 12, 30)).unwrap();
    match scheduler.book_manual(3, 7, overlapping).await.unwrap() {
        Booking::Conflict { existing } => assert_eq!(existing.id, voice.accepted[0].entry.id),
        Booking::Committed(entry) => panic!("double booked: {:?}", entry),
    }

    let adjacent = TimeRange::new(utc(17, 12, 0), utc(17, 12, 30)).unwrap();
    assert!(scheduler.book_manual(3, 7, adjacent).await.unwrap().is_committed());

    let other_agent = TimeRange::new(utc(17, 10, 0), utc(17, 11, 0)).unwrap();
    assert!(scheduler.book_manual(4, 7, other_agent).await.unwrap().is_committed());

    let sources: Vec<_> = scheduler
        .entries_for_agent(3)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.source)
        .collect();
    assert_eq!(sources, vec![EntrySource::Voice, EntrySource::Manual]);
}

#[test]
fn test_detect_conflicts_reports_overlaps() {
    let entry = |agent: AgentId, start: u32, end: u32| {
        ScheduleEntry::new(
            agent,
            7,
            TimeRange::new(utc(17, start, 0), utc(17, end, 0)).unwrap(),
            EntrySource::Manual,
        )
    };

    let entries = vec![entry(3, 9, 11), entry(3, 10, 12), entry(3, 12, 13), entry(4, 9, 11)];
    let conflicts = detect_conflicts(&entries);

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].agent_id, 3);
    assert_eq!(conflicts[0].overlap_minutes, 60);
    assert_eq!(conflicts[0].overlap_start, utc(17, 10, 0));
}
