use saga_common::{UNKNOWN, excerpt, now};
use saga_docs::{DOCUMENT_EXTENSION, DocumentStore};
use saga_memory::WorkingMemory;
use saga_persist::{SaveId, SaveStore, Snapshot, StoreError};

use crate::feed::{CommandFeed, IntelligenceFeed, NoFeed};
use crate::{EngineConfig, EngineError, sheet};

/// Long-term memory category for document writes.
pub const CATEGORY_WORLD_SYNC: &str = "world-sync";

/// Characters of before/after content kept in a write log entry.
const EXCERPT_CHARS: usize = 50;
/// Stand-in for the previous content of a document that did not exist.
const NEW_DOCUMENT: &str = "(new)";

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `section/document` keys written because they were missing.
    pub created: Vec<String>,
    /// `section/document` keys overwritten because they diverged.
    pub updated: Vec<String>,
    pub unchanged: usize,
    /// Snapshot sections with no registered counterpart.
    pub skipped_sections: Vec<String>,
    pub recent_restored: bool,
}

impl ReconcileReport {
    /// Number of document writes performed.
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// What a reset removed or restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub templates_restored: usize,
    pub saves_purged: usize,
    pub chapters_removed: usize,
}

/// Result of [`SnapshotEngine::execute_full_load`].
#[derive(Debug)]
pub enum LoadOutcome {
    Restored { id: SaveId, report: ReconcileReport },
    /// No save matched; nothing was touched.
    NotFound,
    /// The save exists but could not be decoded; nothing was touched.
    Invalid(StoreError),
}

impl LoadOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }
}

/// Orchestrates the document store, the save store, and working memory.
///
/// Single-writer: one caller drives capture, reconcile, and reset at a time.
pub struct SnapshotEngine {
    config: EngineConfig,
    docs: DocumentStore,
    saves: SaveStore,
    memory: WorkingMemory,
    feed: Box<dyn IntelligenceFeed>,
}

impl SnapshotEngine {
    /// Scan the registry and open both durable stores named by `config`.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let docs = DocumentStore::open(&config.registry_dir)?;
        let saves = SaveStore::open(&config.saves_db)?;
        let memory = WorkingMemory::open(&config.memory_db)?;
        let feed: Box<dyn IntelligenceFeed> = match &config.intelligence_command {
            Some(command) => Box::new(CommandFeed::from_command_line(command, &config.root)),
            None => Box::new(NoFeed),
        };
        tracing::info!(
            root = %config.root.display(),
            sections = docs.registry().len(),
            "snapshot engine ready"
        );
        Ok(Self::from_parts(config, docs, saves, memory).with_feed_boxed(feed))
    }

    /// Assemble an engine from already opened parts.
    pub fn from_parts(
        config: EngineConfig,
        docs: DocumentStore,
        saves: SaveStore,
        memory: WorkingMemory,
    ) -> Self {
        Self {
            config,
            docs,
            saves,
            memory,
            feed: Box::new(NoFeed),
        }
    }

    /// Replace the intelligence feed collaborator.
    pub fn with_feed(self, feed: impl IntelligenceFeed + 'static) -> Self {
        self.with_feed_boxed(Box::new(feed))
    }

    fn with_feed_boxed(mut self, feed: Box<dyn IntelligenceFeed>) -> Self {
        self.feed = feed;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn docs(&self) -> &DocumentStore {
        &self.docs
    }

    pub fn saves(&self) -> &SaveStore {
        &self.saves
    }

    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut WorkingMemory {
        &mut self.memory
    }

    pub(crate) fn feed(&self) -> &dyn IntelligenceFeed {
        self.feed.as_ref()
    }

    /// Read one document; absent section or file is `None`.
    pub fn document(&self, section: &str, document: &str) -> Result<Option<String>, EngineError> {
        Ok(self.docs.read(section, document)?)
    }

    /// The protagonist sheet named by the config, if present.
    pub fn protagonist_sheet(&self) -> Result<Option<String>, EngineError> {
        self.document(
            &self.config.protagonist_section,
            &self.config.protagonist_sheet,
        )
    }

    /// Overwrite a document and record the change in long-term memory.
    pub fn update_document(
        &self,
        section: &str,
        document: &str,
        content: &str,
    ) -> Result<(), EngineError> {
        let previous = self.docs.read(section, document)?;
        self.write_and_log(section, document, previous.as_deref(), content)
    }

    fn write_and_log(
        &self,
        section: &str,
        document: &str,
        previous: Option<&str>,
        content: &str,
    ) -> Result<(), EngineError> {
        self.docs
            .write(section, document, content)
            .map_err(|source| EngineError::Write {
                section: section.to_owned(),
                document: document.to_owned(),
                source,
            })?;

        let details = format!(
            "before: {}... after: {}...",
            excerpt(previous.unwrap_or(NEW_DOCUMENT), EXCERPT_CHARS),
            excerpt(content, EXCERPT_CHARS)
        );
        self.memory.remember(
            CATEGORY_WORLD_SYNC,
            &format!("updated {section}/{document}"),
            &details,
        )?;
        Ok(())
    }

    /// Capture every section's documents plus the recent-events buffer.
    pub fn take_global_snapshot(&self) -> Result<Snapshot, EngineError> {
        let _span = tracing::info_span!("capture").entered();
        let mut snapshot = Snapshot::new(now());

        for section in self.docs.list_sections() {
            snapshot.add_section(&section.name);
            for name in self.docs.list_documents(&section.name)? {
                // A document removed mid-scan is simply not captured.
                if let Some(content) = self.docs.read(&section.name, &name)? {
                    snapshot.insert_document(&section.name, name, content);
                }
            }
        }
        snapshot.recent = Some(self.memory.recent_copy());

        tracing::info!(
            sections = snapshot.sections.len(),
            documents = snapshot.document_count(),
            "global snapshot taken"
        );
        Ok(snapshot)
    }

    /// Write back only the documents that are missing or differ from
    /// `snapshot`, then restore its recent-events buffer.
    ///
    /// Not transactional: on a write failure, documents already written stay
    /// written and the error names the failing document. Re-running after a
    /// failure is safe since matching documents are skipped.
    pub fn apply_global_snapshot(
        &mut self,
        snapshot: &Snapshot,
    ) -> Result<ReconcileReport, EngineError> {
        let _span = tracing::info_span!("reconcile").entered();
        let mut report = ReconcileReport::default();

        for (section, documents) in &snapshot.sections {
            if !self.docs.registry().contains(section) {
                tracing::warn!(%section, "snapshot section not registered; skipping");
                report.skipped_sections.push(section.clone());
                continue;
            }
            for (name, content) in documents {
                let key = format!("{section}/{name}");
                match self.docs.read(section, name)? {
                    None => {
                        tracing::info!(document = %key, "completing missing document");
                        self.write_and_log(section, name, None, content)?;
                        report.created.push(key);
                    }
                    Some(current) if current != *content => {
                        tracing::info!(document = %key, "divergence detected; restoring snapshot version");
                        self.write_and_log(section, name, Some(&current), content)?;
                        report.updated.push(key);
                    }
                    Some(_) => report.unchanged += 1,
                }
            }
        }

        if let Some(recent) = &snapshot.recent {
            self.memory.recent.restore(recent.clone());
            report.recent_restored = true;
        }

        tracing::info!(
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged,
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Reconcile from an untyped value such as an exported snapshot file.
    ///
    /// Returns `false`, touching nothing, when the value is not a snapshot.
    pub fn apply_snapshot_value(&mut self, value: serde_json::Value) -> Result<bool, EngineError> {
        match Snapshot::from_json_value(value) {
            Ok(snapshot) => {
                self.apply_global_snapshot(&snapshot)?;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejecting snapshot");
                Ok(false)
            }
        }
    }

    /// Capture and persist the world. When `location` is absent or the
    /// unknown sentinel, it is read from the protagonist sheet.
    pub fn execute_full_save(
        &self,
        chapter: &str,
        location: Option<&str>,
    ) -> Result<SaveId, EngineError> {
        let snapshot = self.take_global_snapshot()?;
        let location = match location {
            Some(loc) if loc != UNKNOWN => loc.to_owned(),
            _ => self.infer_location()?,
        };
        Ok(self.saves.append(&snapshot, chapter, &location)?)
    }

    fn infer_location(&self) -> Result<String, EngineError> {
        let inferred = self
            .protagonist_sheet()?
            .as_deref()
            .and_then(sheet::current_location);
        Ok(inferred.unwrap_or_else(|| UNKNOWN.to_owned()))
    }

    /// Restore a save (the latest when `id` is `None`) into the documents.
    pub fn execute_full_load(&mut self, id: Option<SaveId>) -> Result<LoadOutcome, EngineError> {
        let record = match self.saves.fetch(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(id = ?id.map(|i| i.to_string()), "no save to load");
                return Ok(LoadOutcome::NotFound);
            }
            Err(e) if e.is_corrupt_save() => {
                tracing::warn!(error = %e, "save is unreadable; nothing restored");
                return Ok(LoadOutcome::Invalid(e));
            }
            Err(e) => return Err(e.into()),
        };

        let id = record.summary.id;
        tracing::info!(%id, chapter = %record.summary.chapter, "loading save");
        let report = self.apply_global_snapshot(&record.snapshot)?;
        Ok(LoadOutcome::Restored { id, report })
    }

    /// Restore every template over its reference document, purge all saves,
    /// delete chapter transcripts, and clear the recent-events buffer.
    ///
    /// Only `*.md` files directly in the chapters directory count as
    /// transcripts; other files and subdirectories are left in place.
    /// Long-term memory is kept. Destructive; never call implicitly.
    pub fn reset_game_state(&mut self) -> Result<ResetReport, EngineError> {
        let _span = tracing::info_span!("reset").entered();
        let mut report = ResetReport::default();

        let sections: Vec<String> = self
            .docs
            .list_sections()
            .filter(|s| s.has_templates)
            .map(|s| s.name.clone())
            .collect();
        for section in &sections {
            for name in self.docs.list_templates(section)? {
                let Some(content) = self.docs.read_template(section, &name)? else {
                    continue;
                };
                self.update_document(section, &name, &content)?;
                tracing::info!(%section, document = %name, "document reset from template");
                report.templates_restored += 1;
            }
        }

        report.saves_purged = self.saves.purge_all()?;
        report.chapters_removed = self.remove_chapters()?;
        self.memory.recent.clear();

        tracing::info!(
            templates = report.templates_restored,
            saves = report.saves_purged,
            chapters = report.chapters_removed,
            "world reset"
        );
        Ok(report)
    }

    fn remove_chapters(&self) -> Result<usize, EngineError> {
        let dir = &self.config.chapters_dir;
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_transcript = path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == DOCUMENT_EXTENSION);
            if is_transcript {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
