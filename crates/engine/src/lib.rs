//! Snapshot Engine: capture, reconcile, and reset scattered world documents.
//!
//! # Invariants
//! - A snapshot covers every registered section, even empty ones.
//! - Reconciling against matching documents writes nothing and logs nothing.
//! - Every document write goes through one write-and-log path.
//! - A load that misses leaves every document untouched.
//! - Reset never purges long-term memory.

mod config;
mod engine;
mod feed;
mod quality;
pub mod sheet;
mod story;
mod sync;

pub use config::EngineConfig;
pub use engine::{
    CATEGORY_WORLD_SYNC, LoadOutcome, ReconcileReport, ResetReport, SnapshotEngine,
};
pub use feed::{CommandFeed, FeedStatus, IntelligenceFeed, NoFeed};
pub use quality::{MIN_STORY_CHARS, StoryCheck, StoryIssue, check_story_content};
pub use story::{CATEGORY_TRAVEL, StoryEvent};
pub use sync::{PROTAGONIST_ENTITY, SyncReport};

pub use saga_common::UNKNOWN;
pub use saga_docs::{DocError, DocumentStore, Section, SectionRegistry};
pub use saga_memory::{MemoryEntry, MemoryError, WorkingMemory};
pub use saga_persist::{SaveId, SaveStore, SaveSummary, Snapshot, StoreError};

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document store error: {0}")]
    Doc(#[from] DocError),
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("save store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("failed to write {section}/{document}: {source}")]
    Write {
        section: String,
        document: String,
        #[source]
        source: DocError,
    },
}
