use std::path::{Path, PathBuf};

use crate::DocError;
use crate::registry::{Section, SectionRegistry, list_documents_in};

/// Read/write access to section documents, addressed as
/// `{section}/references/{document}`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    registry: SectionRegistry,
}

impl DocumentStore {
    pub fn new(registry: SectionRegistry) -> Self {
        Self { registry }
    }

    /// Scan a registry directory and wrap the result.
    pub fn open(registry_dir: impl AsRef<Path>) -> Result<Self, DocError> {
        Ok(Self::new(SectionRegistry::scan(registry_dir)?))
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    /// All known sections, ordered by name.
    pub fn list_sections(&self) -> impl Iterator<Item = &Section> {
        self.registry.iter()
    }

    /// Read a document. Absent section or file reads as `None`.
    pub fn read(&self, section: &str, document: &str) -> Result<Option<String>, DocError> {
        let Some(section) = self.registry.get(section) else {
            return Ok(None);
        };
        read_optional(&section.references_dir().join(checked_name(document)?))
    }

    /// Overwrite a document with `content`, creating directories as needed.
    pub fn write(&self, section: &str, document: &str, content: &str) -> Result<(), DocError> {
        let path = self.document_path(section, document)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        tracing::debug!(section, document, bytes = content.len(), "document written");
        Ok(())
    }

    /// Documents currently under the section's references directory.
    ///
    /// Order follows filesystem enumeration and is only fit for display.
    pub fn list_documents(&self, section: &str) -> Result<Vec<String>, DocError> {
        match self.registry.get(section) {
            Some(s) => list_documents_in(&s.references_dir()),
            None => Ok(Vec::new()),
        }
    }

    /// Template documents for the section; empty when it has none.
    pub fn list_templates(&self, section: &str) -> Result<Vec<String>, DocError> {
        match self.registry.get(section) {
            Some(s) => list_documents_in(&s.templates_dir()),
            None => Ok(Vec::new()),
        }
    }

    pub fn read_template(&self, section: &str, document: &str) -> Result<Option<String>, DocError> {
        let Some(section) = self.registry.get(section) else {
            return Ok(None);
        };
        read_optional(&section.templates_dir().join(checked_name(document)?))
    }

    /// Filesystem path of a reference document in a known section.
    pub fn document_path(&self, section: &str, document: &str) -> Result<PathBuf, DocError> {
        let s = self
            .registry
            .get(section)
            .ok_or_else(|| DocError::SectionNotFound(section.to_owned()))?;
        Ok(s.references_dir().join(checked_name(document)?))
    }
}

/// Reject names that would escape the section directory.
fn checked_name(document: &str) -> Result<&str, DocError> {
    let bad = document.is_empty()
        || document == "."
        || document == ".."
        || document.contains(['/', '\\'])
        || document.contains('\0');
    if bad {
        return Err(DocError::InvalidName(document.to_owned()));
    }
    Ok(document)
}

/// Only regular files are documents; anything else at the path reads as
/// absent, matching what `list_documents` enumerates.
fn read_optional(path: &Path) -> Result<Option<String>, DocError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(_) if path.is_dir() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
