use saga_common::{RecentEvent, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document contents of one section, keyed by document name.
pub type SectionDocuments = BTreeMap<String, String>;

/// Errors from decoding an untyped snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("not a snapshot: missing top-level `sections` mapping")]
    MissingSections,
    #[error("snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A point-in-time picture of every section's documents.
///
/// Every section known when the snapshot was taken has an entry, even
/// when it holds no documents. Maps are BTreeMaps so serialized snapshots
/// are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: Timestamp,
    pub sections: BTreeMap<String, SectionDocuments>,
    /// Recent-events buffer at capture time, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<Vec<RecentEvent>>,
}

impl Snapshot {
    /// Empty snapshot stamped with `taken_at`.
    pub fn new(taken_at: Timestamp) -> Self {
        Self {
            taken_at,
            sections: BTreeMap::new(),
            recent: None,
        }
    }

    /// Ensure a (possibly empty) entry exists for `section`.
    pub fn add_section(&mut self, section: impl Into<String>) -> &mut SectionDocuments {
        self.sections.entry(section.into()).or_default()
    }

    pub fn insert_document(
        &mut self,
        section: impl Into<String>,
        document: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.add_section(section)
            .insert(document.into(), content.into());
    }

    pub fn document(&self, section: &str, document: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|docs| docs.get(document))
            .map(String::as_str)
    }

    pub fn document_count(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }

    /// Decode an untyped value, rejecting anything without a `sections`
    /// object at the top level.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        if !value.get("sections").is_some_and(serde_json::Value::is_object) {
            return Err(SnapshotError::MissingSections);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
