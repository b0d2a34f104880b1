use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use saga_common::Timestamp;
use std::path::Path;

use crate::MemoryError;

/// One immutable row of the long-term ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub id: i64,
    pub category: String,
    pub event: String,
    pub details: String,
    pub timestamp: Timestamp,
}

/// Latest known structured state of a named actor.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub name: String,
    pub state: serde_json::Value,
    pub updated_at: Timestamp,
}

/// Durable ledger of significant events plus one-row-per-entity snapshots.
///
/// Owns a single SQLite connection; the engine is the only writer.
pub struct LongTermMemory {
    db: Connection,
}

impl LongTermMemory {
    /// Open or create the ledger at `path`, bootstrapping the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::bootstrap(Connection::open(path.as_ref())?)
    }

    /// Ledger that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(db: Connection) -> Result<Self, MemoryError> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS long_term_memory (
              id         INTEGER PRIMARY KEY AUTOINCREMENT,
              category   TEXT NOT NULL,
              key_event  TEXT NOT NULL,
              details    TEXT NOT NULL DEFAULT '',
              created_at TEXT NOT NULL            -- RFC3339 UTC
            );

            CREATE INDEX IF NOT EXISTS idx_ltm_category ON long_term_memory(category);

            CREATE TABLE IF NOT EXISTS entity_snapshots (
              entity_name TEXT PRIMARY KEY,
              state_json  TEXT NOT NULL,
              updated_at  TEXT NOT NULL           -- RFC3339 UTC
            );
            "#,
        )?;
        Ok(Self { db })
    }

    /// Append an entry. Entries are never updated afterwards.
    pub fn append(&self, category: &str, event: &str, details: &str) -> Result<i64, MemoryError> {
        let now = Utc::now().to_rfc3339();
        self.db.execute(
            "INSERT INTO long_term_memory (category, key_event, details, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            (category, event, details, &now),
        )?;
        let id = self.db.last_insert_rowid();
        tracing::debug!(id, category, event, "long-term memory appended");
        Ok(id)
    }

    /// Entries, most recent first, optionally restricted to one category.
    pub fn query(&self, category: Option<&str>) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut stmt = self.db.prepare(
            "SELECT id, category, key_event, details, created_at
             FROM long_term_memory
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([category], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, category, event, details, created_at) = row?;
            entries.push(MemoryEntry {
                id,
                category,
                event,
                details,
                timestamp: parse_timestamp(&created_at)?,
            });
        }
        Ok(entries)
    }

    /// Total number of ledger entries.
    pub fn len(&self) -> Result<usize, MemoryError> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM long_term_memory", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len()? == 0)
    }

    /// Replace the snapshot stored for `name`.
    pub fn upsert_entity(&self, name: &str, state: &serde_json::Value) -> Result<(), MemoryError> {
        let json = serde_json::to_string(state)?;
        self.db.execute(
            r#"
            INSERT INTO entity_snapshots (entity_name, state_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(entity_name) DO UPDATE SET
              state_json = excluded.state_json,
              updated_at = excluded.updated_at
            "#,
            (name, &json, Utc::now().to_rfc3339()),
        )?;
        tracing::debug!(entity = name, "entity snapshot stored");
        Ok(())
    }

    pub fn fetch_entity(&self, name: &str) -> Result<Option<EntitySnapshot>, MemoryError> {
        let row = self
            .db
            .query_row(
                "SELECT state_json, updated_at FROM entity_snapshots WHERE entity_name = ?1",
                [name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((json, updated_at)) = row else {
            return Ok(None);
        };
        Ok(Some(EntitySnapshot {
            name: name.to_owned(),
            state: serde_json::from_str(&json)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

fn parse_timestamp(text: &str) -> Result<Timestamp, MemoryError> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_and_query_most_recent_first() {
        let ltm = LongTermMemory::open_in_memory().unwrap();
        ltm.append("travel", "arrived at the ferry", "").unwrap();
        ltm.append("world-sync", "updated npc/npc_list.md", "before ... after ...").unwrap();
        ltm.append("travel", "arrived at the pass", "snow").unwrap();

        let all = ltm.query(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event, "arrived at the pass");
        assert_eq!(all[2].event, "arrived at the ferry");

        let travel = ltm.query(Some("travel")).unwrap();
        assert_eq!(travel.len(), 2);
        assert!(travel.iter().all(|e| e.category == "travel"));
        assert_eq!(travel[0].details, "snow");
    }

    #[test]
    fn query_unknown_category_is_empty() {
        let ltm = LongTermMemory::open_in_memory().unwrap();
        ltm.append("travel", "x", "").unwrap();
        assert!(ltm.query(Some("nothing")).unwrap().is_empty());
    }

    #[test]
    fn entity_upsert_replaces_previous_state() {
        let ltm = LongTermMemory::open_in_memory().unwrap();
        assert!(ltm.fetch_entity("protagonist").unwrap().is_none());

        ltm.upsert_entity("protagonist", &json!({"hp": "80", "location": "ferry"}))
            .unwrap();
        ltm.upsert_entity("protagonist", &json!({"hp": "95"})).unwrap();

        let snap = ltm.fetch_entity("protagonist").unwrap().unwrap();
        assert_eq!(snap.state, json!({"hp": "95"}));
    }

    #[test]
    fn ledger_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("memory.db");
        {
            let ltm = LongTermMemory::open(&path).unwrap();
            ltm.append("lore", "the sword was found", "").unwrap();
        }
        let ltm = LongTermMemory::open(&path).unwrap();
        assert_eq!(ltm.len().unwrap(), 1);
        assert_eq!(ltm.query(None).unwrap()[0].event, "the sword was found");
    }
}
