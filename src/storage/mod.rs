//! Storage for CRM records, interview state and schedules.
//!
//! The engines depend only on the [`IntakeStore`] trait. [`MemoryStore`] is
//! the bundled implementation, optionally persisted to a JSON file.

mod memory;
mod traits;
mod types;

pub use memory::{MemoryStore, PERSISTENCE_FILE};
pub use traits::IntakeStore;
pub use types::*;

use crate::config::Config;
use crate::error::Result;

/// Create the store described by the configuration, seeded if a seed file is set.
pub async fn create_store(config: &Config) -> Result<MemoryStore> {
    let store = match config.data_dir() {
        Some(data_dir) => MemoryStore::with_persistence(&data_dir).await?,
        None => MemoryStore::new(),
    };

    if let Some(seed_file) = config.seed_file() {
        store.seed_from_file(&seed_file).await?;
    }

    Ok(store)
}
