use crate::{EngineError, SnapshotEngine, sheet};

/// Long-term memory category for protagonist movement.
pub const CATEGORY_TRAVEL: &str = "travel";

/// A narrative development reported by the storyteller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryEvent {
    /// The protagonist arrived somewhere new.
    Travel { location: String },
    /// Anything else (combat outcome, item found, ...); narrative only.
    Other { kind: String },
}

impl SnapshotEngine {
    /// Record `description` in the recent-events buffer and apply the
    /// event's effect on world documents.
    ///
    /// Returns whether any document changed.
    pub fn process_story_event(
        &mut self,
        event: &StoryEvent,
        description: &str,
    ) -> Result<bool, EngineError> {
        self.memory_mut().note(description);

        match event {
            StoryEvent::Travel { location } => self.move_protagonist(location, description),
            StoryEvent::Other { kind } => {
                tracing::debug!(%kind, "story event noted");
                Ok(false)
            }
        }
    }

    fn move_protagonist(&self, location: &str, description: &str) -> Result<bool, EngineError> {
        let Some(current) = self.protagonist_sheet()? else {
            tracing::warn!(%location, "no protagonist sheet to move");
            return Ok(false);
        };
        let Some(updated) = sheet::with_location(&current, location) else {
            tracing::warn!(%location, "protagonist sheet has no location line");
            return Ok(false);
        };

        let config = self.config();
        self.update_document(
            &config.protagonist_section,
            &config.protagonist_sheet,
            &updated,
        )?;
        self.memory().remember(
            CATEGORY_TRAVEL,
            &format!("arrived at {location}"),
            description,
        )?;
        tracing::info!(%location, "protagonist moved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineConfig;
    use saga_docs::{DocumentStore, MANIFEST_FILE, SectionRegistry};
    use saga_memory::WorkingMemory;
    use saga_persist::SaveStore;
    use std::path::Path;

    fn engine(root: &Path, sheet: Option<&str>) -> SnapshotEngine {
        let config = EngineConfig::from_root(root);
        let dir = config.registry_dir.join(&config.protagonist_section);
        std::fs::create_dir_all(dir.join("references")).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "").unwrap();
        if let Some(sheet) = sheet {
            std::fs::write(dir.join("references").join(&config.protagonist_sheet), sheet).unwrap();
        }
        let docs = DocumentStore::new(SectionRegistry::scan(&config.registry_dir).unwrap());
        SnapshotEngine::from_parts(
            config,
            docs,
            SaveStore::open_in_memory().unwrap(),
            WorkingMemory::open_in_memory().unwrap(),
        )
    }

    #[test]
    fn travel_rewrites_sheet_and_remembers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path(), Some("- **当前位置**：大研镇\n"));
        let event = StoryEvent::Travel {
            location: "桃花坞".into(),
        };

        let changed = engine
            .process_story_event(&event, "江未央穿过石窟裂缝，来到了桃花坞。")
            .unwrap();
        assert!(changed);

        let sheet = engine.protagonist_sheet().unwrap().unwrap();
        assert_eq!(sheet, "- **当前位置**：桃花坞\n");

        let travel = engine.memory().recall(Some(CATEGORY_TRAVEL)).unwrap();
        assert_eq!(travel.len(), 1);
        assert_eq!(travel[0].event, "arrived at 桃花坞");
        assert_eq!(engine.memory().recent.len(), 1);
    }

    #[test]
    fn travel_without_sheet_only_notes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path(), None);
        let event = StoryEvent::Travel {
            location: "桃花坞".into(),
        };
        assert!(!engine.process_story_event(&event, "lost in fog").unwrap());
        assert_eq!(engine.memory().recent.len(), 1);
        assert!(engine.memory().recall(None).unwrap().is_empty());
    }

    #[test]
    fn other_events_touch_only_the_buffer() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path(), Some("- **当前位置**：大研镇\n"));
        let event = StoryEvent::Other {
            kind: "combat_result".into(),
        };
        assert!(!engine.process_story_event(&event, "the duel ends").unwrap());
        assert_eq!(engine.memory().recent.last().unwrap().narrative, "the duel ends");
        assert!(engine.memory().recall(None).unwrap().is_empty());
    }
}
