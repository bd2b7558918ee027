//! Intent & Category Classifier.
//!
//! Maps free text onto a closed label set: feedback categories for interview
//! answers, scheduling intents for voice transcripts. Classification is a pure
//! function of the text, the domain and the configured threshold.

mod classifier;
mod types;

pub use classifier::Classifier;
pub use types::*;
