use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::DocError;

/// Marker file that makes a directory a section.
pub const MANIFEST_FILE: &str = "SKILL.md";
/// Subdirectory holding a section's live documents.
pub const REFERENCES_DIR: &str = "references";
/// Subdirectory holding reset sources.
pub const TEMPLATES_DIR: &str = "templates";
pub const SCRIPTS_DIR: &str = "scripts";
/// Extension (without the dot) of recognised documents.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Metadata parsed from the manifest's YAML front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SectionManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SectionManifest {
    /// Parse the `---` delimited front matter at the top of a manifest.
    ///
    /// Manifests without front matter yield the empty manifest. Malformed
    /// YAML is logged and also yields the empty manifest.
    pub fn parse(text: &str) -> Self {
        let Some(yaml) = front_matter(text) else {
            return Self::default();
        };
        match serde_yaml::from_str::<SectionManifest>(yaml) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed manifest front matter");
                Self::default()
            }
        }
    }
}

fn front_matter(text: &str) -> Option<&str> {
    let rest = text.trim_start_matches('\u{feff}').strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// A named group of documents rooted at one directory.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub root: PathBuf,
    pub manifest: SectionManifest,
    /// Reference documents present when the registry was scanned.
    pub reference_names: Vec<String>,
    pub has_references: bool,
    pub has_templates: bool,
    pub has_scripts: bool,
}

impl Section {
    /// Directory of live documents (may not exist yet).
    pub fn references_dir(&self) -> PathBuf {
        self.root.join(REFERENCES_DIR)
    }

    /// Directory of reset templates (may not exist).
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    fn load(name: String, root: PathBuf) -> Result<Self, DocError> {
        let manifest_text = std::fs::read_to_string(root.join(MANIFEST_FILE))?;
        let references = root.join(REFERENCES_DIR);
        let reference_names = list_documents_in(&references)?;
        Ok(Self {
            name,
            manifest: SectionManifest::parse(&manifest_text),
            reference_names,
            has_references: references.is_dir(),
            has_templates: root.join(TEMPLATES_DIR).is_dir(),
            has_scripts: root.join(SCRIPTS_DIR).is_dir(),
            root,
        })
    }
}

/// Immutable set of sections discovered under a registry directory.
///
/// Uses BTreeMap so iteration over sections is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    sections: BTreeMap<String, Section>,
}

impl SectionRegistry {
    /// Scan `root` for subdirectories carrying a manifest marker.
    ///
    /// A missing registry directory is not an error: it yields an empty
    /// registry.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self, DocError> {
        let root = root.as_ref().to_path_buf();
        let mut sections = BTreeMap::new();

        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "registry directory missing; no sections loaded");
            return Ok(Self { sections });
        }

        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || !path.join(MANIFEST_FILE).is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };
            let section = Section::load(name.clone(), path)?;
            tracing::debug!(
                section = %name,
                references = section.reference_names.len(),
                templates = section.has_templates,
                "registered section"
            );
            sections.insert(name, section);
        }

        tracing::info!(root = %root.display(), count = sections.len(), "section registry scanned");
        Ok(Self { sections })
    }

    /// Look up a section by name.
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// All sections, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Names of recognised documents directly inside `dir`, in filesystem
/// enumeration order. A missing directory yields no names.
pub(crate) fn list_documents_in(dir: &Path) -> Result<Vec<String>, DocError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let recognised = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == DOCUMENT_EXTENSION);
        if !recognised {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_section(root: &Path, name: &str, manifest: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        dir
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SectionRegistry::scan(tmp.path().join("nope")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn scan_requires_manifest_marker() {
        let tmp = tempfile::tempdir().unwrap();
        make_section(tmp.path(), "protagonist", "# Protagonist\n");
        fs::create_dir_all(tmp.path().join("stray")).unwrap();
        fs::write(tmp.path().join("loose.md"), "not a section").unwrap();

        let registry = SectionRegistry::scan(tmp.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("protagonist"));
        assert!(registry.get("stray").is_none());
    }

    #[test]
    fn scan_records_folders_and_references() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = make_section(tmp.path(), "npc", "");
        fs::create_dir_all(dir.join(REFERENCES_DIR)).unwrap();
        fs::create_dir_all(dir.join(TEMPLATES_DIR)).unwrap();
        fs::write(dir.join(REFERENCES_DIR).join("npc_list.md"), "roster").unwrap();
        fs::write(dir.join(REFERENCES_DIR).join("notes.txt"), "ignored").unwrap();

        let registry = SectionRegistry::scan(tmp.path()).unwrap();
        let section = registry.get("npc").unwrap();
        assert!(section.has_references);
        assert!(section.has_templates);
        assert!(!section.has_scripts);
        assert_eq!(section.reference_names, vec!["npc_list.md".to_string()]);
    }

    #[test]
    fn manifest_front_matter_is_parsed() {
        let manifest = SectionManifest::parse(
            "---\nname: quest-skill\ndescription: Tracks the quest log\n---\n# Quests\n",
        );
        assert_eq!(manifest.name.as_deref(), Some("quest-skill"));
        assert_eq!(manifest.description.as_deref(), Some("Tracks the quest log"));
    }

    #[test]
    fn manifest_without_front_matter_is_empty() {
        assert_eq!(SectionManifest::parse("# Just a heading\n"), SectionManifest::default());
    }

    #[test]
    fn malformed_front_matter_degrades_to_empty() {
        let manifest = SectionManifest::parse("---\nname: [unclosed\n---\n");
        assert_eq!(manifest, SectionManifest::default());
    }

    #[test]
    fn iteration_is_ordered_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        make_section(tmp.path(), "zeta", "");
        make_section(tmp.path(), "alpha", "");
        let registry = SectionRegistry::scan(tmp.path()).unwrap();
        let names: Vec<_> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
