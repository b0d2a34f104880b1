//! Document Store: the scattered, human-readable world-state documents.
//!
//! # Layout
//! ```text
//! <registry>/
//!   <section>/
//!     SKILL.md          - manifest marker (optional YAML front matter)
//!     references/*.md   - live documents
//!     templates/*.md    - reset sources, mirroring references/
//!     scripts/          - informational only
//! ```
//!
//! # Invariants
//! - Sections are discovered once; the registry is immutable afterwards.
//! - A missing document or section reads as absent, never as an error.
//! - Writes overwrite whole documents and propagate I/O failures.

mod registry;
mod store;

pub use registry::{
    DOCUMENT_EXTENSION, MANIFEST_FILE, REFERENCES_DIR, SCRIPTS_DIR, Section, SectionManifest,
    SectionRegistry, TEMPLATES_DIR,
};
pub use store::DocumentStore;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("section not found: {0}")]
    SectionNotFound(String),
    #[error("invalid document name: {0:?}")]
    InvalidName(String),
}
