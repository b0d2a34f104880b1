//! Persistence: cross-section world snapshots and the durable save store.
//!
//! # Invariants
//! - Save rows are append-only; every save is a new row.
//! - Snapshots are stored by value and verified by SHA-256 on fetch.
//! - A decoded snapshot is byte-for-byte the snapshot that was saved.

mod snapshot;
mod store;

pub use snapshot::{Snapshot, SnapshotError};
pub use store::{
    SAVE_KIND, SAVE_SCHEMA_VERSION, SaveId, SaveMeta, SaveRecord, SaveStore, SaveSummary,
    StoreError,
};
