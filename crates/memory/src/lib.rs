//! Working memory: a bounded recent-events buffer and a durable ledger.
//!
//! # Invariants
//! - The recent-events buffer never holds more than ten entries.
//! - Long-term entries are append-only; nothing here updates or deletes them.
//! - Entity snapshots keep exactly one row per entity name.

mod ledger;
mod recent;

pub use ledger::{EntitySnapshot, LongTermMemory, MemoryEntry};
pub use recent::{RECENT_CAPACITY, RecentEvents};

use saga_common::RecentEvent;
use std::path::Path;

/// Errors from memory operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad timestamp in ledger: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Both memory tiers behind one handle.
pub struct WorkingMemory {
    pub recent: RecentEvents,
    ledger: LongTermMemory,
}

impl WorkingMemory {
    /// Open the durable ledger at `path` with an empty recent buffer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Ok(Self {
            recent: RecentEvents::new(),
            ledger: LongTermMemory::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Ok(Self {
            recent: RecentEvents::new(),
            ledger: LongTermMemory::open_in_memory()?,
        })
    }

    pub fn ledger(&self) -> &LongTermMemory {
        &self.ledger
    }

    /// Record a significant event in the long-term ledger.
    pub fn remember(&self, category: &str, event: &str, details: &str) -> Result<i64, MemoryError> {
        self.ledger.append(category, event, details)
    }

    pub fn recall(&self, category: Option<&str>) -> Result<Vec<MemoryEntry>, MemoryError> {
        self.ledger.query(category)
    }

    pub fn save_entity_state(
        &self,
        name: &str,
        state: &serde_json::Value,
    ) -> Result<(), MemoryError> {
        self.ledger.upsert_entity(name, state)
    }

    pub fn entity_state(&self, name: &str) -> Result<Option<EntitySnapshot>, MemoryError> {
        self.ledger.fetch_entity(name)
    }

    /// Append a narrative line to the recent buffer.
    pub fn note(&mut self, narrative: impl Into<String>) {
        self.recent.push(narrative);
    }

    pub fn recent_copy(&self) -> Vec<RecentEvent> {
        self.recent.snapshot_copy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_independent() {
        let mut memory = WorkingMemory::open_in_memory().unwrap();
        memory.note("rain on the roof tiles");
        memory.remember("lore", "rumour heard", "").unwrap();

        memory.recent.clear();
        assert!(memory.recent_copy().is_empty());
        assert_eq!(memory.recall(None).unwrap().len(), 1);
    }
}
