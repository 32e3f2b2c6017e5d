//! Event deduplication against the store.
//!
//! The store's `events.id` primary key is the dedupe index. There is no
//! separate cache: a lookup goes straight to the primary key, and the insert
//! itself is the final arbiter (`ON CONFLICT DO NOTHING`), so an id can never
//! be stored twice even if two writers pass [`DedupeGate::contains`] at once.

use crate::Result;
use osrc_core::Event;
use rusqlite::{Connection, OptionalExtension, params};

/// Dedupe gate bound to one connection (usually a record's savepoint).
pub struct DedupeGate<'c> {
    conn: &'c Connection,
}

impl<'c> DedupeGate<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Whether an event with `event_id` is already stored.
    pub fn contains(&self, event_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM events WHERE id = ?", [event_id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert `event` unless its id is already stored.
    ///
    /// Returns `true` if the event was inserted, `false` if it was a duplicate.
    pub fn insert(&self, event: &Event) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO events (id, event_type, created_at, day, hour, actor_id, repo_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                event.id,
                event.kind.as_str(),
                event.created_at.to_rfc3339(),
                event.day,
                event.hour,
                event.actor.0,
                event.repo.0,
            ],
        )?;
        Ok(changed == 1)
    }
}
