//! SQLite schema definition and migrations.

use rusqlite::Connection;
use thiserror::Error;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema version {found} is newer than supported {supported}")]
    VersionTooNew { found: i32, supported: i32 },
}

/// Create the tables, or recreate them when an older layout is found.
///
/// Everything stored here is derived from the realm, so an outdated layout
/// is dropped rather than migrated; the next publish repopulates it.
pub fn init_schema(conn: &Connection) -> Result<(), SchemaError> {
    match stored_version(conn)? {
        None => {}
        Some(SCHEMA_VERSION) => return Ok(()),
        Some(found) if found > SCHEMA_VERSION => {
            return Err(SchemaError::VersionTooNew { found, supported: SCHEMA_VERSION });
        }
        Some(found) => {
            tracing::info!(found, current = SCHEMA_VERSION, "dropping outdated index tables");
            conn.execute_batch(
                "DROP TABLE IF EXISTS instances;
                 DROP TABLE IF EXISTS realm_versions;
                 DROP TABLE schema_version;",
            )?;
        }
    }
    create_tables(conn)?;
    conn.execute("INSERT INTO schema_version (id, version) VALUES (1, ?1)", [SCHEMA_VERSION])?;
    Ok(())
}

fn stored_version(conn: &Connection) -> Result<Option<i32>, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(None);
    }
    Ok(Some(conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?))
}

fn create_tables(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(
        r#"
        CREATE TABLE schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- One row per instance URL; entry_json holds the serialized entry or error
        CREATE TABLE instances (
            url TEXT PRIMARY KEY,
            realm_url TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('entry', 'error')),
            entry_json TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        );

        CREATE INDEX idx_instances_realm ON instances(realm_url);

        CREATE TABLE realm_versions (
            realm_url TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            indexed_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_init_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"instances".to_string()));
        assert!(tables.contains(&"realm_versions".to_string()));
    }

    #[test]
    fn test_init_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_outdated_layout_is_recreated() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO instances (url, realm_url, kind, entry_json, indexed_at)
             VALUES ('http://test/realm/a', 'http://test/realm/', 'entry', '{}', 'now')",
            [],
        )
        .unwrap();
        conn.execute("UPDATE schema_version SET version = 0", []).unwrap();

        init_schema(&conn).unwrap();
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0)).unwrap();
        assert_eq!(rows, 0);
        let version: i32 =
            conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("UPDATE schema_version SET version = 99", []).unwrap();
        assert!(matches!(init_schema(&conn), Err(SchemaError::VersionTooNew { found: 99, .. })));
    }
}
