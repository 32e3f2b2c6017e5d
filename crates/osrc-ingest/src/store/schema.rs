//! SQLite schema for the event store.
//!
//! Three tables:
//!
//! - `actors`: one row per upstream user id, owned by the entity resolver
//! - `repos`: one row per upstream repository id, owned by the entity resolver
//! - `events`: one row per archive event, keyed by the upstream event id
//!
//! The `events.id` primary key is what makes ingestion idempotent.

use crate::{Error, Result};
use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates all tables on a fresh database. A database written by a different
/// schema version is refused; there are no migrations yet.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version != SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "store schema version {} is not supported (expected {})",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS actors (
            id INTEGER PRIMARY KEY,
            external_id INTEGER NOT NULL UNIQUE,
            login TEXT,
            avatar_url TEXT
        );

        CREATE TABLE IF NOT EXISTS repos (
            id INTEGER PRIMARY KEY,
            external_id INTEGER NOT NULL UNIQUE,
            name TEXT,
            url TEXT
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            day INTEGER NOT NULL CHECK (day BETWEEN 0 AND 6),
            hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
            actor_id INTEGER NOT NULL REFERENCES actors(id),
            repo_id INTEGER NOT NULL REFERENCES repos(id)
        );

        CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
        CREATE INDEX IF NOT EXISTS idx_events_actor ON events(actor_id);
        CREATE INDEX IF NOT EXISTS idx_events_repo ON events(repo_id);
        CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);
        "#,
    )
}
