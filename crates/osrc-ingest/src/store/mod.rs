//! SQLite-backed event store.
//!
//! The store is the durable half of the pipeline: events, and the actors and
//! repositories they reference. All writes for one shard happen inside one
//! transaction ([`EventStore::with_shard_batch`]); each record runs in its own
//! savepoint inside it ([`ShardBatch::record`]) so a failing record leaves no
//! partial rows behind.

mod resolve;
pub mod schema;

pub use resolve::{EntityResolver, SqliteResolver};

use crate::Result;
use crate::pipeline::DedupeGate;
use osrc_core::EventKind;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};

/// Handle to the event store.
pub struct EventStore {
    path: PathBuf,
    /// SQLite connection (protected by mutex for thread safety).
    conn: Mutex<Connection>,
}

/// One stored event, as read back for reporting and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: String,
    pub kind: EventKind,
    pub created_at: String,
    pub day: u8,
    pub hour: u8,
    pub actor_id: i64,
    pub repo_id: i64,
}

impl EventStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers unblocked while a shard transaction is open
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        schema::init_schema(&conn)?;

        tracing::debug!("Opened event store at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Where the store lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside one shard transaction.
    ///
    /// The transaction is committed whether `f` succeeds or fails: work done
    /// before a shard-level failure is kept. If `f` fails and the commit fails
    /// too, the commit error is logged and `f`'s error is returned. If `f`
    /// panics, the transaction is rolled back as it unwinds.
    pub fn with_shard_batch<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ShardBatch<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let mut batch = ShardBatch {
            tx: conn.transaction()?,
        };

        let outcome = f(&mut batch);
        let committed = batch.tx.commit();

        match (outcome, committed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(commit_err)) => {
                tracing::error!("Failed to commit partial shard batch: {}", commit_err);
                Err(e)
            }
        }
    }

    /// Whether an event with `id` is stored.
    pub fn contains_event(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        DedupeGate::new(&conn).contains(id)
    }

    /// Look up a stored event by id.
    pub fn get_event(&self, id: &str) -> Result<Option<StoredEvent>> {
        let conn = self.conn.lock();
        let event = conn
            .query_row(
                "SELECT id, event_type, created_at, day, hour, actor_id, repo_id
                 FROM events WHERE id = ?",
                [id],
                |row| {
                    Ok(StoredEvent {
                        id: row.get(0)?,
                        kind: EventKind::from(row.get::<_, String>(1)?.as_str()),
                        created_at: row.get(2)?,
                        day: row.get(3)?,
                        hour: row.get(4)?,
                        actor_id: row.get(5)?,
                        repo_id: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(event)
    }

    /// Number of stored events.
    pub fn event_count(&self) -> Result<u64> {
        self.count("events")
    }

    /// Number of stored actors.
    pub fn actor_count(&self) -> Result<u64> {
        self.count("actors")
    }

    /// Number of stored repositories.
    pub fn repo_count(&self) -> Result<u64> {
        self.count("repos")
    }

    fn count(&self, table: &'static str) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    }
}

/// The open transaction for one shard.
pub struct ShardBatch<'conn> {
    tx: Transaction<'conn>,
}

impl ShardBatch<'_> {
    /// Run one record's work in a savepoint.
    ///
    /// On `Ok` the savepoint is released into the shard transaction. On `Err`
    /// everything `f` wrote is rolled back and the shard transaction carries
    /// on unaffected.
    pub fn record<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let sp = self.tx.savepoint()?;
        let value = f(&sp)?;
        sp.commit()?;
        Ok(value)
    }
}
