//! Type-specific payload enrichment.
//!
//! Some event kinds carry a second repository in their payload. Resolving it
//! registers that repository with the entity store; the event itself keeps
//! pointing at its primary repository.
//!
//! | Kind | Payload sub-object |
//! |------|--------------------|
//! | `ForkEvent` | `payload.forkee` |
//! | `PullRequestEvent` | `payload.pull_request.base.repo` |
//! | `PullRequestReviewCommentEvent` | `payload.pull_request.base.repo` |
//!
//! Every other kind, including unknown tags, is a no-op.

use crate::Result;
use crate::store::EntityResolver;
use metrics::counter;
use osrc_core::EventKind;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

/// What enrichment did for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment {
    /// The kind carries no enrichment.
    None,
    /// The payload repository was resolved.
    Resolved,
    /// The kind carries enrichment but the payload lacked the sub-object.
    MissingPayload,
}

/// Run the enrichment step for an event of `kind`.
///
/// A rejected payload fragment is an [`crate::Error::EntityResolution`] and
/// fails the record.
pub fn enrich<R>(
    conn: &Connection,
    resolver: &R,
    kind: &EventKind,
    payload: &Value,
) -> Result<Enrichment>
where
    R: EntityResolver + ?Sized,
{
    let target = match kind {
        EventKind::Fork => forkee(payload),
        EventKind::PullRequest | EventKind::PullRequestReviewComment => {
            pull_request_base_repo(payload)
        }
        EventKind::Push
        | EventKind::Watch
        | EventKind::Create
        | EventKind::Delete
        | EventKind::Issues
        | EventKind::IssueComment
        | EventKind::CommitComment
        | EventKind::Gollum
        | EventKind::Member
        | EventKind::Public
        | EventKind::Release
        | EventKind::Other(_) => return Ok(Enrichment::None),
    };

    let Some(repo) = target else {
        debug!("{} payload has no repository to enrich", kind);
        return Ok(Enrichment::MissingPayload);
    };

    resolver.resolve_repo(conn, repo)?;
    counter!("ingest_enrichments_total", "kind" => kind.as_str().to_string()).increment(1);
    Ok(Enrichment::Resolved)
}

/// The forked-into repository of a `ForkEvent`.
pub fn forkee(payload: &Value) -> Option<&Value> {
    payload.get("forkee").filter(|v| v.is_object())
}

/// The base repository of a pull request, shared by `PullRequestEvent` and
/// `PullRequestReviewCommentEvent`.
pub fn pull_request_base_repo(payload: &Value) -> Option<&Value> {
    payload
        .pointer("/pull_request/base/repo")
        .filter(|v| v.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::store::schema::init_schema;
    use crate::test_support::CountingResolver;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn pr_payload(base_repo_id: i64) -> Value {
        json!({
            "action": "opened",
            "pull_request": {
                "number": 1,
                "head": {"repo": {"id": 999, "name": "head/repo"}},
                "base": {"repo": {"id": base_repo_id, "full_name": "base/repo"}}
            }
        })
    }

    #[test]
    fn test_fork_resolves_forkee() {
        let conn = conn();
        let resolver = CountingResolver::default();
        let payload = json!({"forkee": {"id": 77, "full_name": "someone/fork"}});

        let outcome = enrich(&conn, &resolver, &EventKind::Fork, &payload).unwrap();
        assert_eq!(outcome, Enrichment::Resolved);
        assert_eq!(resolver.repos(), vec![payload["forkee"].clone()]);
    }

    #[test]
    fn test_pull_request_resolves_base_repo() {
        let conn = conn();
        let resolver = CountingResolver::default();

        let outcome = enrich(&conn, &resolver, &EventKind::PullRequest, &pr_payload(5)).unwrap();
        assert_eq!(outcome, Enrichment::Resolved);

        let repos = resolver.repos();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0]["id"], 5);
    }

    #[test]
    fn test_review_comment_uses_same_extraction_as_pull_request() {
        let payload = pr_payload(5);
        assert_eq!(
            pull_request_base_repo(&payload),
            Some(&payload["pull_request"]["base"]["repo"])
        );

        let conn = conn();
        let pr = CountingResolver::default();
        let comment = CountingResolver::default();
        enrich(&conn, &pr, &EventKind::PullRequest, &payload).unwrap();
        enrich(&conn, &comment, &EventKind::PullRequestReviewComment, &payload).unwrap();
        assert_eq!(pr.repos(), comment.repos());
    }

    #[test]
    fn test_other_kinds_are_noops() {
        let conn = conn();
        let resolver = CountingResolver::default();
        let payload = json!({"forkee": {"id": 1}, "pull_request": {"base": {"repo": {"id": 2}}}});

        for kind in [
            EventKind::Push,
            EventKind::Watch,
            EventKind::Issues,
            EventKind::Other("SponsorshipEvent".into()),
        ] {
            assert_eq!(
                enrich(&conn, &resolver, &kind, &payload).unwrap(),
                Enrichment::None
            );
        }
        assert!(resolver.repos().is_empty());
    }

    #[test]
    fn test_missing_sub_object_is_noop() {
        let conn = conn();
        let resolver = CountingResolver::default();

        let outcome = enrich(&conn, &resolver, &EventKind::Fork, &json!({})).unwrap();
        assert_eq!(outcome, Enrichment::MissingPayload);

        let outcome = enrich(
            &conn,
            &resolver,
            &EventKind::PullRequest,
            &json!({"pull_request": {"base": {}}}),
        )
        .unwrap();
        assert_eq!(outcome, Enrichment::MissingPayload);
        assert!(resolver.repos().is_empty());
    }

    #[test]
    fn test_rejected_fragment_fails_record() {
        let conn = conn();
        let resolver = CountingResolver::default();
        let payload = json!({"forkee": {"name": "no-id"}});

        let err = enrich(&conn, &resolver, &EventKind::Fork, &payload).unwrap_err();
        assert!(matches!(err, Error::EntityResolution(_)));
    }
}
