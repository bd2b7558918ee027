//! Agent schedules and voice booking.
//!
//! - [`has_conflict`] and [`find_conflict`]: half-open overlap checks for one agent
//! - [`detect_conflicts`]: audit a list of entries for double bookings
//! - [`VoiceScheduler`]: transcript to conflict-checked entries, with partial success

mod conflict;
mod interpreter;
mod types;

pub use conflict::{detect_conflicts, find_conflict, has_conflict};
pub use interpreter::{VoiceScheduler, DEFAULT_MAX_CANDIDATES};
pub use types::*;
