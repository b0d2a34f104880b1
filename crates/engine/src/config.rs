use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::EngineError;

/// Paths and well-known names the engine is built from.
///
/// Constructed once and handed to [`crate::SnapshotEngine::open`]; nothing
/// reads configuration from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Project root every relative path resolves against.
    pub root: PathBuf,
    /// Directory scanned for sections.
    pub registry_dir: PathBuf,
    pub saves_db: PathBuf,
    pub memory_db: PathBuf,
    /// Chapter transcripts, wiped on reset.
    pub chapters_dir: PathBuf,
    pub protagonist_section: String,
    pub protagonist_sheet: String,
    /// External intelligence feed: program followed by its arguments.
    pub intelligence_command: Option<Vec<String>>,
}

impl EngineConfig {
    /// Default layout under `root`.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            registry_dir: root.join(".agent").join("skills"),
            saves_db: root.join(".agent").join("state").join("saves.db"),
            memory_db: root.join(".agent").join("state").join("memory.db"),
            chapters_dir: root.join("history").join("chapters"),
            protagonist_section: "protagonist-skill".into(),
            protagonist_sheet: "character_sheet.md".into(),
            intelligence_command: None,
            root,
        }
    }

    /// Read a YAML config file.
    ///
    /// `root` resolves against the file's directory (and defaults to it);
    /// every other relative path resolves against `root`. Missing keys keep
    /// their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_yaml::from_str(&text)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(file.resolve(&base))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    root: Option<PathBuf>,
    registry_dir: Option<PathBuf>,
    saves_db: Option<PathBuf>,
    memory_db: Option<PathBuf>,
    chapters_dir: Option<PathBuf>,
    protagonist_section: Option<String>,
    protagonist_sheet: Option<String>,
    intelligence_command: Option<Vec<String>>,
}

impl ConfigFile {
    fn resolve(self, base: &Path) -> EngineConfig {
        let root = match self.root {
            Some(root) => anchored(base, root),
            None => base.to_path_buf(),
        };
        let mut config = EngineConfig::from_root(&root);
        if let Some(p) = self.registry_dir {
            config.registry_dir = anchored(&root, p);
        }
        if let Some(p) = self.saves_db {
            config.saves_db = anchored(&root, p);
        }
        if let Some(p) = self.memory_db {
            config.memory_db = anchored(&root, p);
        }
        if let Some(p) = self.chapters_dir {
            config.chapters_dir = anchored(&root, p);
        }
        if let Some(s) = self.protagonist_section {
            config.protagonist_section = s;
        }
        if let Some(s) = self.protagonist_sheet {
            config.protagonist_sheet = s;
        }
        config.intelligence_command = self.intelligence_command.filter(|cmd| !cmd.is_empty());
        config
    }
}

fn anchored(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hang_off_root() {
        let config = EngineConfig::from_root("/game");
        assert_eq!(config.registry_dir, PathBuf::from("/game/.agent/skills"));
        assert_eq!(config.chapters_dir, PathBuf::from("/game/history/chapters"));
        assert_eq!(config.protagonist_sheet, "character_sheet.md");
        assert!(config.intelligence_command.is_none());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saga.yaml");
        std::fs::write(
            &path,
            "root: world\nsaves_db: data/saves.db\nchapters_dir: /abs/chapters\n\
             intelligence_command: [python, intel.py, --list]\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        let root = tmp.path().join("world");
        assert_eq!(config.root, root);
        assert_eq!(config.saves_db, root.join("data/saves.db"));
        assert_eq!(config.chapters_dir, PathBuf::from("/abs/chapters"));
        assert_eq!(config.registry_dir, root.join(".agent/skills"));
        assert_eq!(
            config.intelligence_command,
            Some(vec!["python".into(), "intel.py".into(), "--list".into()])
        );
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saga.yaml");
        std::fs::write(&path, "{}\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::from_root(tmp.path()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saga.yaml");
        std::fs::write(&path, "registry: oops\n").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(EngineError::Config(_))));
    }
}
