//! Entity resolution for actors and repositories.
//!
//! Resolution is upsert-or-fetch keyed by the upstream numeric id. The same
//! fragment resolved twice yields the same handle, and descriptive columns
//! (login, name, url) track the latest value seen.

use crate::{Error, Result};
use osrc_core::{ActorHandle, RepoHandle};
use rusqlite::{Connection, ErrorCode, params};
use serde_json::Value;

/// Maps raw actor / repository fragments to stable store handles.
///
/// Every call receives the connection of the record being ingested, so the
/// upsert joins that record's savepoint and is undone with it.
pub trait EntityResolver {
    /// Upsert-or-fetch the actor described by `actor`.
    fn resolve_user(&self, conn: &Connection, actor: &Value) -> Result<ActorHandle>;

    /// Upsert-or-fetch the repository described by `repo`.
    fn resolve_repo(&self, conn: &Connection, repo: &Value) -> Result<RepoHandle>;
}

/// [`EntityResolver`] backed by the `actors` and `repos` tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteResolver;

impl EntityResolver for SqliteResolver {
    fn resolve_user(&self, conn: &Connection, actor: &Value) -> Result<ActorHandle> {
        let external_id = external_id("actor", actor)?;
        let login = first_str(actor, &["login", "display_login"]);
        let avatar_url = first_str(actor, &["avatar_url"]);

        conn.query_row(
            "INSERT INTO actors (external_id, login, avatar_url) VALUES (?1, ?2, ?3)
             ON CONFLICT(external_id) DO UPDATE SET
                login = COALESCE(excluded.login, actors.login),
                avatar_url = COALESCE(excluded.avatar_url, actors.avatar_url)
             RETURNING id",
            params![external_id, login, avatar_url],
            |row| row.get(0),
        )
        .map(ActorHandle)
        .map_err(|e| upsert_error("actor", external_id, e))
    }

    fn resolve_repo(&self, conn: &Connection, repo: &Value) -> Result<RepoHandle> {
        let external_id = external_id("repo", repo)?;
        let name = first_str(repo, &["full_name", "name"]);
        let url = first_str(repo, &["url"]);

        conn.query_row(
            "INSERT INTO repos (external_id, name, url) VALUES (?1, ?2, ?3)
             ON CONFLICT(external_id) DO UPDATE SET
                name = COALESCE(excluded.name, repos.name),
                url = COALESCE(excluded.url, repos.url)
             RETURNING id",
            params![external_id, name, url],
            |row| row.get(0),
        )
        .map(RepoHandle)
        .map_err(|e| upsert_error("repo", external_id, e))
    }
}

/// Upstream numeric id of a fragment. Numeric strings are accepted.
fn external_id(what: &str, fragment: &Value) -> Result<i64> {
    let Some(obj) = fragment.as_object() else {
        return Err(Error::EntityResolution(format!(
            "{} fragment is not an object",
            what
        )));
    };

    let id = match obj.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| Error::EntityResolution(format!("{} fragment has no numeric id", what)))
}

/// A constraint rejecting this fragment's values is the record's fault; any
/// other failure is the store's and aborts the shard.
fn upsert_error(what: &str, external_id: i64, e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(ref code, _)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            Error::EntityResolution(format!("{} {}: {}", what, external_id, e))
        }
        e => Error::Database(e),
    }
}

fn first_str<'a>(fragment: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| fragment.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}
