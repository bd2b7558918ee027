//! Time Resolver.
//!
//! Turns natural-language time expressions ("tomorrow at 3pm and Wednesday
//! 10 to noon") into absolute UTC ranges, relative to a reference instant
//! whose timezone is the agency's wall clock.
//!
//! # Example
//!
//! ```ignore
//! use chrono::{TimeZone, Utc};
//! use intake::temporal::resolve;
//!
//! let monday = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
//! let resolution = resolve("tomorrow at 3pm", &monday);
//! assert_eq!(resolution.ranges.len(), 1);
//! ```

mod resolver;
mod types;

pub use resolver::{range_label, resolve, spoken_label, TimeResolver};
pub use types::*;
