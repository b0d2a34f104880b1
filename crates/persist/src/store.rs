//! SQLite-backed save store.
//!
//! One table, one row per save:
//! ```text
//! game_saves(id, saved_at, chapter, location, payload, payload_sha256, metadata_json)
//! ```
//! `payload` is the snapshot as CBOR, zstd compressed. `payload_sha256`
//! is checked on every fetch.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use saga_common::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::snapshot::Snapshot;

/// Current save schema version.
pub const SAVE_SCHEMA_VERSION: u32 = 1;
/// Kind tag recorded with every save.
pub const SAVE_KIND: &str = "full";

const SAVE_ID_PREFIX: &str = "DB_SAVE_ID_";

/// Errors from save store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored row whose metadata, timestamp, or compressed payload
    /// cannot be read back.
    #[error("save {id} is corrupt: {reason}")]
    CorruptRow { id: SaveId, reason: String },
    #[error("integrity check failed for save {id}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        id: SaveId,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: save has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("invalid save id: {0:?}")]
    InvalidSaveId(String),
}

impl StoreError {
    /// Whether the error describes an unreadable save rather than a
    /// failure of the store itself.
    pub fn is_corrupt_save(&self) -> bool {
        matches!(
            self,
            Self::CorruptRow { .. }
                | Self::IntegrityMismatch { .. }
                | Self::SchemaMismatch { .. }
                | Self::CborDecode(_)
        )
    }
}

/// Opaque handle to one save row.
///
/// Renders as `DB_SAVE_ID_<n>`; parses from that form or a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveId(i64);

impl SaveId {
    pub fn from_row(id: i64) -> Self {
        Self(id)
    }

    pub fn row(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SAVE_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for SaveId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits.strip_prefix(SAVE_ID_PREFIX).unwrap_or(digits);
        digits
            .parse::<i64>()
            .map(SaveId)
            .map_err(|_| StoreError::InvalidSaveId(s.to_owned()))
    }
}

/// Metadata stored alongside each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMeta {
    pub schema_version: u32,
    pub save_kind: String,
}

impl Default for SaveMeta {
    fn default() -> Self {
        Self {
            schema_version: SAVE_SCHEMA_VERSION,
            save_kind: SAVE_KIND.to_owned(),
        }
    }
}

/// Classification of a save, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub id: SaveId,
    pub saved_at: Timestamp,
    pub chapter: String,
    pub location: String,
}

/// A fully decoded save.
#[derive(Debug, Clone)]
pub struct SaveRecord {
    pub summary: SaveSummary,
    pub meta: SaveMeta,
    pub snapshot: Snapshot,
}

/// Append-only store of full world snapshots.
pub struct SaveStore {
    db: Connection,
}

impl SaveStore {
    /// Open or create the store at `path`, bootstrapping the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::bootstrap(Connection::open(&path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS game_saves (
              id             INTEGER PRIMARY KEY AUTOINCREMENT,
              saved_at       TEXT NOT NULL,     -- RFC3339 UTC
              chapter        TEXT NOT NULL,
              location       TEXT NOT NULL,
              payload        BLOB NOT NULL,     -- CBOR + zstd snapshot
              payload_sha256 TEXT NOT NULL,
              metadata_json  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { db })
    }

    /// Persist `snapshot` as a new row and return its id.
    pub fn append(
        &self,
        snapshot: &Snapshot,
        chapter: &str,
        location: &str,
    ) -> Result<SaveId, StoreError> {
        let payload = zstd_compress(&cbor_serialize(snapshot)?)?;
        let digest = sha256_hex(&payload);
        let meta = serde_json::to_string(&SaveMeta::default())?;

        self.db.execute(
            "INSERT INTO game_saves (saved_at, chapter, location, payload, payload_sha256, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                Utc::now().to_rfc3339(),
                chapter,
                location,
                &payload,
                &digest,
                &meta,
            ),
        )?;
        let id = SaveId(self.db.last_insert_rowid());
        tracing::info!(%id, chapter, location, bytes = payload.len(), "save appended");
        Ok(id)
    }

    /// Fetch one save, or the most recent when `id` is `None`.
    ///
    /// An id that matches no row yields `Ok(None)`.
    pub fn fetch(&self, id: Option<SaveId>) -> Result<Option<SaveRecord>, StoreError> {
        const COLUMNS: &str =
            "SELECT id, saved_at, chapter, location, payload, payload_sha256, metadata_json FROM game_saves";
        let raw = match id {
            Some(id) => self
                .db
                .query_row(&format!("{COLUMNS} WHERE id = ?1"), [id.0], RawRow::from_row)
                .optional()?,
            None => self
                .db
                .query_row(&format!("{COLUMNS} ORDER BY id DESC LIMIT 1"), [], RawRow::from_row)
                .optional()?,
        };

        match raw {
            Some(raw) => Ok(Some(raw.decode()?)),
            None => {
                tracing::debug!(id = ?id.map(|i| i.to_string()), "save not found");
                Ok(None)
            }
        }
    }

    /// Save summaries, most recent first.
    pub fn list(&self) -> Result<Vec<SaveSummary>, StoreError> {
        let mut stmt = self
            .db
            .prepare("SELECT id, saved_at, chapter, location FROM game_saves ORDER BY id DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, saved_at, chapter, location) = row?;
            let id = SaveId(id);
            summaries.push(SaveSummary {
                id,
                saved_at: parse_timestamp(id, &saved_at)?,
                chapter,
                location,
            });
        }
        Ok(summaries)
    }

    /// Number of saves currently stored.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM game_saves", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Delete every save. Ids are not reused afterwards.
    pub fn purge_all(&self) -> Result<usize, StoreError> {
        let removed = self.db.execute("DELETE FROM game_saves", [])?;
        tracing::warn!(removed, "all saves purged");
        Ok(removed)
    }
}

struct RawRow {
    id: i64,
    saved_at: String,
    chapter: String,
    location: String,
    payload: Vec<u8>,
    digest: String,
    meta: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            saved_at: row.get(1)?,
            chapter: row.get(2)?,
            location: row.get(3)?,
            payload: row.get(4)?,
            digest: row.get(5)?,
            meta: row.get(6)?,
        })
    }

    fn decode(self) -> Result<SaveRecord, StoreError> {
        let id = SaveId(self.id);
        let meta: SaveMeta = serde_json::from_str(&self.meta).map_err(|e| StoreError::CorruptRow {
            id,
            reason: format!("metadata: {e}"),
        })?;
        if meta.schema_version != SAVE_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                file_version: meta.schema_version,
                expected_version: SAVE_SCHEMA_VERSION,
            });
        }

        let actual = sha256_hex(&self.payload);
        if actual != self.digest {
            return Err(StoreError::IntegrityMismatch {
                id,
                expected: self.digest,
                actual,
            });
        }

        let saved_at = parse_timestamp(id, &self.saved_at)?;
        let raw = zstd_decompress(&self.payload).map_err(|e| StoreError::CorruptRow {
            id,
            reason: format!("payload: {e}"),
        })?;
        let snapshot = cbor_deserialize(&raw)?;
        Ok(SaveRecord {
            summary: SaveSummary {
                id,
                saved_at,
                chapter: self.chapter,
                location: self.location,
            },
            meta,
            snapshot,
        })
    }
}

fn parse_timestamp(id: SaveId, text: &str) -> Result<Timestamp, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            id,
            reason: format!("saved_at {text:?}: {e}"),
        })
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_common::RecentEvent;

    fn snapshot(sheet: &str) -> Snapshot {
        let mut snap = Snapshot::new(saga_common::now());
        snap.insert_document("protagonist", "character_sheet.md", sheet);
        snap.add_section("map");
        snap.recent = Some(vec![RecentEvent::new("the ferry leaves at dusk")]);
        snap
    }

    #[test]
    fn append_and_fetch_by_id() {
        let store = SaveStore::open_in_memory().unwrap();
        let snap = snapshot("hp 80");
        let id = store.append(&snap, "Ch1", "Town").unwrap();

        let record = store.fetch(Some(id)).unwrap().unwrap();
        assert_eq!(record.snapshot, snap);
        assert_eq!(record.summary.chapter, "Ch1");
        assert_eq!(record.summary.location, "Town");
        assert_eq!(record.meta, SaveMeta::default());
    }

    #[test]
    fn fetch_none_returns_latest() {
        let store = SaveStore::open_in_memory().unwrap();
        store.append(&snapshot("old"), "Ch1", "Town").unwrap();
        let newest = store.append(&snapshot("new"), "Ch2", "Pass").unwrap();

        let record = store.fetch(None).unwrap().unwrap();
        assert_eq!(record.summary.id, newest);
        assert_eq!(
            record.snapshot.document("protagonist", "character_sheet.md"),
            Some("new")
        );
    }

    #[test]
    fn fetch_missing_is_none() {
        let store = SaveStore::open_in_memory().unwrap();
        assert!(store.fetch(None).unwrap().is_none());
        assert!(store.fetch(Some(SaveId::from_row(42))).unwrap().is_none());
    }

    #[test]
    fn ids_increase_and_survive_purge() {
        let store = SaveStore::open_in_memory().unwrap();
        let a = store.append(&snapshot("a"), "Ch1", "Town").unwrap();
        let b = store.append(&snapshot("b"), "Ch1", "Town").unwrap();
        assert!(b > a);

        assert_eq!(store.purge_all().unwrap(), 2);
        assert!(store.is_empty().unwrap());

        let c = store.append(&snapshot("c"), "Ch1", "Town").unwrap();
        assert!(c > b);
    }

    #[test]
    fn list_is_most_recent_first() {
        let store = SaveStore::open_in_memory().unwrap();
        store.append(&snapshot("a"), "Ch1", "Town").unwrap();
        store.append(&snapshot("b"), "Ch2", "Pass").unwrap();
        let chapters: Vec<_> = store.list().unwrap().into_iter().map(|s| s.chapter).collect();
        assert_eq!(chapters, vec!["Ch2", "Ch1"]);
    }

    #[test]
    fn save_id_display_and_parse() {
        let id = SaveId::from_row(7);
        assert_eq!(id.to_string(), "DB_SAVE_ID_7");
        assert_eq!("DB_SAVE_ID_7".parse::<SaveId>().unwrap(), id);
        assert_eq!("7".parse::<SaveId>().unwrap(), id);
        assert!("DB_SAVE_ID_x".parse::<SaveId>().is_err());
    }

    #[test]
    fn corrupted_payload_fails_closed() {
        let store = SaveStore::open_in_memory().unwrap();
        let id = store.append(&snapshot("hp 80"), "Ch1", "Town").unwrap();
        store
            .db
            .execute("UPDATE game_saves SET payload = ?1", [vec![0u8, 1, 2, 3]])
            .unwrap();

        match store.fetch(Some(id)) {
            Err(StoreError::IntegrityMismatch { id: bad, .. }) => assert_eq!(bad, id),
            other => panic!("expected IntegrityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let store = SaveStore::open_in_memory().unwrap();
        store.append(&snapshot("hp 80"), "Ch1", "Town").unwrap();
        store
            .db
            .execute(
                "UPDATE game_saves SET metadata_json = ?1",
                [r#"{"schema_version":999,"save_kind":"full"}"#],
            )
            .unwrap();

        match store.fetch(None) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, SAVE_SCHEMA_VERSION);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_metadata_is_a_corrupt_row() {
        let store = SaveStore::open_in_memory().unwrap();
        let id = store.append(&snapshot("hp 80"), "Ch1", "Town").unwrap();
        store
            .db
            .execute("UPDATE game_saves SET metadata_json = 'garbage'", [])
            .unwrap();

        match store.fetch(Some(id)) {
            Err(e @ StoreError::CorruptRow { .. }) => assert!(e.is_corrupt_save()),
            other => panic!("expected CorruptRow, got {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_a_corrupt_row() {
        let store = SaveStore::open_in_memory().unwrap();
        store.append(&snapshot("hp 80"), "Ch1", "Town").unwrap();
        store
            .db
            .execute("UPDATE game_saves SET saved_at = 'last tuesday'", [])
            .unwrap();

        assert!(matches!(store.fetch(None), Err(StoreError::CorruptRow { .. })));
        assert!(matches!(store.list(), Err(StoreError::CorruptRow { .. })));
    }

    #[test]
    fn undecompressible_payload_is_a_corrupt_row() {
        let store = SaveStore::open_in_memory().unwrap();
        store.append(&snapshot("hp 80"), "Ch1", "Town").unwrap();
        // Keep the digest consistent so only decompression can fail.
        let junk = vec![9u8; 16];
        store
            .db
            .execute(
                "UPDATE game_saves SET payload = ?1, payload_sha256 = ?2",
                (&junk, sha256_hex(&junk)),
            )
            .unwrap();

        assert!(matches!(store.fetch(None), Err(StoreError::CorruptRow { .. })));
    }

    #[test]
    fn store_failures_are_not_corrupt_saves() {
        let err = StoreError::Io(std::io::Error::other("disk gone"));
        assert!(!err.is_corrupt_save());
    }

    #[test]
    fn reopen_preserves_saves() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saves").join("saga.db");
        let id = {
            let store = SaveStore::open(&path).unwrap();
            store.append(&snapshot("kept"), "Ch3", "Valley").unwrap()
        };

        let store = SaveStore::open(&path).unwrap();
        let record = store.fetch(Some(id)).unwrap().unwrap();
        assert_eq!(
            record.snapshot.document("protagonist", "character_sheet.md"),
            Some("kept")
        );
    }
}
