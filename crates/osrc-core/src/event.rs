//! Archive event model.
//!
//! This module provides:
//! - [`RawEvent`]: one decoded archive line, with the minimum required fields
//! - [`EventKind`]: the event type tag, with a catch-all for unknown types
//! - [`Event`]: the normalized fact that gets persisted
//! - Timestamp parsing and the derived day-of-week / hour-of-day fields

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One archive record as it appears on a shard line.
///
/// Only the fields the pipeline needs are decoded. `actor`, `repo` and
/// `payload` stay as raw JSON so they can be handed to entity resolution
/// untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// Source-assigned event identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Event type tag, e.g. `PushEvent`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Creation timestamp, in one of the archive's timestamp formats.
    pub created_at: String,

    /// Actor fragment, consumed by entity resolution.
    pub actor: Value,

    /// Target repository fragment, consumed by entity resolution.
    pub repo: Value,

    /// Type-specific payload.
    pub payload: Value,
}

impl RawEvent {
    /// Decode one shard line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not JSON, a required field is missing,
    /// or `id` is empty / `actor`, `repo`, `payload` are not objects.
    pub fn from_line(line: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(line)?;

        if raw.id.trim().is_empty() {
            return Err(Error::InvalidField {
                field: "id",
                reason: "empty identifier".to_string(),
            });
        }
        for (field, value) in [
            ("actor", &raw.actor),
            ("repo", &raw.repo),
            ("payload", &raw.payload),
        ] {
            if !value.is_object() {
                return Err(Error::InvalidField {
                    field,
                    reason: format!("expected object, got {}", json_type_name(value)),
                });
            }
        }

        Ok(raw)
    }

    /// The parsed event type tag.
    pub fn event_kind(&self) -> EventKind {
        EventKind::from(self.kind.as_str())
    }
}

/// Event type tag.
///
/// The archive's type set is open-ended; tags not listed here decode to
/// [`EventKind::Other`] and keep their original name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    Fork,
    PullRequest,
    PullRequestReviewComment,
    Watch,
    Create,
    Delete,
    Issues,
    IssueComment,
    CommitComment,
    Gollum,
    Member,
    Public,
    Release,
    Other(String),
}

impl EventKind {
    /// The archive tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Push => "PushEvent",
            Self::Fork => "ForkEvent",
            Self::PullRequest => "PullRequestEvent",
            Self::PullRequestReviewComment => "PullRequestReviewCommentEvent",
            Self::Watch => "WatchEvent",
            Self::Create => "CreateEvent",
            Self::Delete => "DeleteEvent",
            Self::Issues => "IssuesEvent",
            Self::IssueComment => "IssueCommentEvent",
            Self::CommitComment => "CommitCommentEvent",
            Self::Gollum => "GollumEvent",
            Self::Member => "MemberEvent",
            Self::Public => "PublicEvent",
            Self::Release => "ReleaseEvent",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "PushEvent" => Self::Push,
            "ForkEvent" => Self::Fork,
            "PullRequestEvent" => Self::PullRequest,
            "PullRequestReviewCommentEvent" => Self::PullRequestReviewComment,
            "WatchEvent" => Self::Watch,
            "CreateEvent" => Self::Create,
            "DeleteEvent" => Self::Delete,
            "IssuesEvent" => Self::Issues,
            "IssueCommentEvent" => Self::IssueComment,
            "CommitCommentEvent" => Self::CommitComment,
            "GollumEvent" => Self::Gollum,
            "MemberEvent" => Self::Member,
            "PublicEvent" => Self::Public,
            "ReleaseEvent" => Self::Release,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store handle for a resolved actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub i64);

/// Store handle for a resolved repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepoHandle(pub i64);

/// A normalized archive event, ready to persist.
///
/// Only the primary actor and repository are attached; entities touched by
/// payload enrichment are not referenced from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    /// Day of week, Monday = 0.
    pub day: u8,
    /// Hour of day, 0..=23, in UTC.
    pub hour: u8,
    pub actor: ActorHandle,
    pub repo: RepoHandle,
}

impl Event {
    /// Build an event, deriving `day` and `hour` from `created_at`.
    pub fn new(
        id: String,
        kind: EventKind,
        created_at: DateTime<Utc>,
        actor: ActorHandle,
        repo: RepoHandle,
    ) -> Self {
        let (day, hour) = day_and_hour(&created_at);
        Self {
            id,
            kind,
            created_at,
            day,
            hour,
            actor,
            repo,
        }
    }
}

/// Day of week (Monday = 0) and hour of day for an instant.
pub fn day_and_hour(at: &DateTime<Utc>) -> (u8, u8) {
    (at.weekday().num_days_from_monday() as u8, at.hour() as u8)
}

/// Parse an archive `created_at` value into a UTC instant.
///
/// Accepted forms:
/// - RFC 3339 (`2015-01-01T15:00:00Z`, `2012-03-10T22:00:09-08:00`)
/// - legacy archive form (`2012/03/10 22:00:09 -0800`)
/// - offset-less ISO (`2023-06-15T14:30:00`), taken as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y/%m/%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc());
        }
    }

    Err(Error::InvalidTimestamp(value.to_string()))
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
