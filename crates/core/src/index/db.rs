//! SQLite-backed indexer.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use url::Url;

use super::schema::init_schema;
use super::state::{RunState, SearchEntryWithErrors};
use super::store::{Indexer, IndexerError, StoredEntries};

/// Index database handle.
pub struct DbIndexer {
    conn: Mutex<Connection>,
}

impl DbIndexer {
    /// Open or create an index database at the given path.
    pub fn open(path: &Path) -> Result<Self, IndexerError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| IndexerError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, IndexerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Version of the last commit for a realm.
    pub fn realm_version(&self, realm: &Url) -> Result<Option<u64>, IndexerError> {
        let conn = self.conn.lock();
        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM realm_versions WHERE realm_url = ?1",
                [realm.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|v| v as u64))
    }

    pub fn count_instances(&self, realm: &Url) -> Result<i64, IndexerError> {
        let conn = self.conn.lock();
        let count =
            conn.query_row("SELECT COUNT(*) FROM instances WHERE realm_url = ?1", [realm.as_str()], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

fn decode(url: &str, json: &str) -> Result<SearchEntryWithErrors, IndexerError> {
    serde_json::from_str(json).map_err(|source| IndexerError::Decode { url: url.to_string(), source })
}

impl Indexer for DbIndexer {
    fn commit(&self, state: &Arc<RunState>, version: u64) -> Result<(), IndexerError> {
        let realm = state.realm_url.as_str();
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM instances WHERE realm_url = ?1", [realm])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO instances (url, realm_url, kind, entry_json, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (url, instance) in &state.instances {
                let kind = match instance {
                    SearchEntryWithErrors::Entry { .. } => "entry",
                    SearchEntryWithErrors::Error { .. } => "error",
                };
                let json = serde_json::to_string(instance).map_err(|source| IndexerError::Encode {
                    url: url.to_string(),
                    source,
                })?;
                insert.execute(params![url.as_str(), realm, kind, json, now])?;
            }
        }
        tx.execute(
            "INSERT INTO realm_versions (realm_url, version, indexed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(realm_url) DO UPDATE SET version = excluded.version, indexed_at = excluded.indexed_at",
            params![realm, version as i64, now],
        )?;
        tx.commit()?;

        tracing::debug!(realm = %realm, version, instances = state.instances.len(), "committed index");
        Ok(())
    }

    fn get_card(&self, url: &Url) -> Result<Option<SearchEntryWithErrors>, IndexerError> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row("SELECT entry_json FROM instances WHERE url = ?1", [url.as_str()], |row| row.get(0))
            .optional()?;
        json.map(|json| decode(url.as_str(), &json)).transpose()
    }

    fn entries(&self, realm: &Url) -> Result<StoredEntries, IndexerError> {
        // Commits take the same lock, so the version and rows agree.
        let conn = self.conn.lock();
        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM realm_versions WHERE realm_url = ?1",
                [realm.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let mut stmt = conn.prepare(
            "SELECT url, entry_json FROM instances
             WHERE realm_url = ?1 AND kind = 'entry'
             ORDER BY url",
        )?;
        let rows = stmt
            .query_map([realm.as_str()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (url, json) in rows {
            if let SearchEntryWithErrors::Entry { entry } = decode(&url, &json)? {
                entries.push(*entry);
            }
        }
        Ok(StoredEntries { version: version.map(|v| v as u64), entries })
    }
}
