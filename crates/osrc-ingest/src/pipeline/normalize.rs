//! Record normalization.
//!
//! Turns one decoded [`RawEvent`] into a stored [`Event`]:
//!
//! 1. duplicate check (known ids stop here, before any resolution)
//! 2. timestamp parse
//! 3. actor, then repository resolution
//! 4. insert, with day-of-week and hour-of-day derived from the timestamp
//! 5. payload enrichment
//!
//! All writes go through `conn`, which the driver scopes to a savepoint, so an
//! error at any step leaves nothing behind.

use super::dedupe::DedupeGate;
use super::dispatch::{self, Enrichment};
use crate::Result;
use crate::store::EntityResolver;
use osrc_core::{Event, RawEvent, parse_timestamp};
use rusqlite::Connection;

/// Outcome of normalizing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The id was already stored; nothing was written.
    Duplicate,
    /// The event was stored.
    Inserted { event: Event, enrichment: Enrichment },
}

/// Normalize and persist one record.
pub fn normalize<R>(conn: &Connection, resolver: &R, raw: RawEvent) -> Result<Normalized>
where
    R: EntityResolver + ?Sized,
{
    let gate = DedupeGate::new(conn);
    if gate.contains(&raw.id)? {
        return Ok(Normalized::Duplicate);
    }

    let created_at = parse_timestamp(&raw.created_at)?;
    let actor = resolver.resolve_user(conn, &raw.actor)?;
    let repo = resolver.resolve_repo(conn, &raw.repo)?;

    let kind = raw.event_kind();
    let event = Event::new(raw.id, kind, created_at, actor, repo);

    if !gate.insert(&event)? {
        return Ok(Normalized::Duplicate);
    }

    let enrichment = dispatch::enrich(conn, resolver, &event.kind, &raw.payload)?;

    Ok(Normalized::Inserted { event, enrichment })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::store::SqliteResolver;
    use crate::store::schema::init_schema;
    use crate::test_support::{CountingResolver, fork_line, push_line};
    use osrc_core::EventKind;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn raw(line: &str) -> RawEvent {
        RawEvent::from_line(line).unwrap()
    }

    #[test]
    fn test_new_event_is_inserted() {
        let conn = conn();
        let outcome = normalize(&conn, &SqliteResolver, raw(&push_line("100"))).unwrap();

        match outcome {
            Normalized::Inserted { event, enrichment } => {
                assert_eq!(event.id, "100");
                assert_eq!(event.kind, EventKind::Push);
                assert_eq!(enrichment, Enrichment::None);
            }
            Normalized::Duplicate => panic!("expected insert"),
        }
    }

    #[test]
    fn test_duplicate_skips_resolution() {
        let conn = conn();
        normalize(&conn, &SqliteResolver, raw(&push_line("100"))).unwrap();

        let resolver = CountingResolver::default();
        let outcome = normalize(&conn, &resolver, raw(&push_line("100"))).unwrap();
        assert_eq!(outcome, Normalized::Duplicate);
        assert!(resolver.users().is_empty());
        assert!(resolver.repos().is_empty());
    }

    #[test]
    fn test_fork_event_references_source_repo() {
        let conn = conn();
        let resolver = CountingResolver::default();
        let outcome = normalize(&conn, &resolver, raw(&fork_line("200", 10, 20))).unwrap();

        let Normalized::Inserted { event, enrichment } = outcome else {
            panic!("expected insert");
        };
        assert_eq!(enrichment, Enrichment::Resolved);

        // primary repo, then forkee
        let repos = resolver.repos();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0]["id"], 10);
        assert_eq!(repos[1]["id"], 20);

        let source: i64 = conn
            .query_row("SELECT id FROM repos WHERE external_id = 10", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(event.repo.0, source);
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let conn = conn();
        let line = push_line("1").replace("2015-01-01T15:00:00Z", "yesterday");
        let err = normalize(&conn, &SqliteResolver, raw(&line)).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_legacy_timestamp_is_normalized() {
        let conn = conn();
        let line = push_line("1").replace("2015-01-01T15:00:00Z", "2012/03/10 22:00:09 -0800");
        let Normalized::Inserted { event, .. } =
            normalize(&conn, &SqliteResolver, raw(&line)).unwrap()
        else {
            panic!("expected insert");
        };
        // 2012-03-11T06:00:09Z, a Sunday
        assert_eq!((event.day, event.hour), (6, 6));
    }

    #[test]
    fn test_rejected_actor_is_entity_resolution_error() {
        let conn = conn();
        let line = push_line("1").replace(r#""id":1001,"#, "");
        let err = normalize(&conn, &SqliteResolver, raw(&line)).unwrap_err();
        assert!(matches!(err, Error::EntityResolution(_)));
    }
}
