use saga_common::UNKNOWN;
use serde_json::json;

use crate::feed::FeedStatus;
use crate::{EngineError, SnapshotEngine, sheet};

/// Entity-snapshot key for the protagonist.
pub const PROTAGONIST_ENTITY: &str = "protagonist";

/// Result of [`SnapshotEngine::trigger_global_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub protagonist_synced: bool,
    pub intelligence: FeedStatus,
}

impl SnapshotEngine {
    /// Store the protagonist's current sheet as an entity snapshot.
    ///
    /// Returns `false` when there is no sheet to read.
    pub fn sync_protagonist_to_memory(&self) -> Result<bool, EngineError> {
        let Some(content) = self.protagonist_sheet()? else {
            tracing::warn!("protagonist sheet missing; entity snapshot not updated");
            return Ok(false);
        };

        let hp = sheet::hit_points(&content)
            .map(|(current, _)| current.to_string())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let location = sheet::current_location(&content).unwrap_or_else(|| UNKNOWN.to_owned());

        tracing::info!(%location, %hp, "protagonist state captured");
        let state = json!({
            "hp": hp,
            "location": location,
            "full_sheet": content,
        });
        self.memory().save_entity_state(PROTAGONIST_ENTITY, &state)?;
        Ok(true)
    }

    /// End-of-chapter hook: sync the protagonist, then poll the
    /// intelligence feed. Feed failures are reported, not raised.
    pub fn trigger_global_sync(&self) -> Result<SyncReport, EngineError> {
        let _span = tracing::info_span!("global_sync").entered();
        let protagonist_synced = self.sync_protagonist_to_memory()?;
        let intelligence = self.feed().status();
        tracing::info!(
            protagonist_synced,
            feed_ok = intelligence.succeeded(),
            "global sync complete"
        );
        Ok(SyncReport {
            protagonist_synced,
            intelligence,
        })
    }
}
