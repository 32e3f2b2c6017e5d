//! Fixtures shared by the unit tests.

use crate::Result;
use crate::config::FetchConfig;
use crate::source::ShardOpener;
use crate::store::{EntityResolver, SqliteResolver};
use flate2::Compression;
use flate2::write::GzEncoder;
use osrc_core::{ActorHandle, RepoHandle};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A `PushEvent` line by actor 1001 on repo 1, created 2015-01-01T15:00:00Z.
pub fn push_line(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"PushEvent","actor":{{"id":1001,"login":"octocat"}},"repo":{{"id":1,"name":"octocat/hello","url":"https://api.github.com/repos/octocat/hello"}},"payload":{{"size":1}},"public":true,"created_at":"2015-01-01T15:00:00Z"}}"#
    )
}

/// A `ForkEvent` line forking repo `source` into repo `forkee`.
pub fn fork_line(id: &str, source: i64, forkee: i64) -> String {
    format!(
        r#"{{"id":"{id}","type":"ForkEvent","actor":{{"id":1002,"login":"forker"}},"repo":{{"id":{source},"name":"upstream/project"}},"payload":{{"forkee":{{"id":{forkee},"name":"project","full_name":"forker/project"}}}},"created_at":"2015-01-01T15:10:00Z"}}"#
    )
}

/// A `PullRequestEvent` line whose base repository is `base`.
pub fn pr_line(id: &str, base: i64) -> String {
    format!(
        r#"{{"id":"{id}","type":"PullRequestEvent","actor":{{"id":1003,"login":"contributor"}},"repo":{{"id":{base},"name":"upstream/project"}},"payload":{{"action":"opened","pull_request":{{"number":1,"base":{{"repo":{{"id":{base},"full_name":"upstream/project"}}}}}}}},"created_at":"2015-01-01T15:20:00Z"}}"#
    )
}

/// Gzip `data` as a single member.
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Gzip `lines`, newline-terminated.
pub fn gzip(lines: &[String]) -> Vec<u8> {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    gzip_bytes(text.as_bytes())
}

/// Write `lines` as a gzip shard file under `dir`.
pub fn write_shard(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, gzip(lines)).unwrap();
    path
}

/// Insert one actor and one repository, returning their handles.
pub fn seed_entities(conn: &Connection) -> (ActorHandle, RepoHandle) {
    let actor = SqliteResolver
        .resolve_user(conn, &json!({"id": 1, "login": "seed"}))
        .unwrap();
    let repo = SqliteResolver
        .resolve_repo(conn, &json!({"id": 1, "name": "seed/repo"}))
        .unwrap();
    (actor, repo)
}

/// Serve `responses` over HTTP, one per connection, in order.
///
/// Returns the base URL (`http://127.0.0.1:{port}`).
pub fn serve(responses: Vec<(&'static str, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });

    format!("http://{}", addr)
}

/// Serve `body` once, but send only its first `sent` bytes and then hold the
/// connection open for `stall` without writing anything more.
///
/// The `Content-Length` header advertises the whole body.
pub fn serve_stalled(body: Vec<u8>, sent: usize, stall: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = [0u8; 4096];
        let _ = stream.read(&mut request);

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body[..sent]);
        let _ = stream.flush();
        std::thread::sleep(stall);
    });

    format!("http://{}", addr)
}

/// Opener with a short timeout, no backoff and no system proxy.
pub fn test_opener(attempts: u32) -> ShardOpener {
    test_opener_with_timeout(attempts, Duration::from_secs(10))
}

pub fn test_opener_with_timeout(attempts: u32, timeout: Duration) -> ShardOpener {
    let config = FetchConfig {
        timeout_secs: timeout.as_secs(),
        attempts,
        backoff_ms: 0,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .unwrap();
    ShardOpener::with_client(client, config)
}

/// Resolver that records every fragment it is asked to resolve.
#[derive(Default)]
pub struct CountingResolver {
    users: Mutex<Vec<Value>>,
    repos: Mutex<Vec<(Value, RepoHandle)>>,
}

impl CountingResolver {
    pub fn users(&self) -> Vec<Value> {
        self.users.lock().clone()
    }

    pub fn repos(&self) -> Vec<Value> {
        self.repos.lock().iter().map(|(v, _)| v.clone()).collect()
    }

    /// Handle returned for the first resolution of upstream repo `id`.
    pub fn handle_for_repo(&self, id: i64) -> Option<RepoHandle> {
        self.repos
            .lock()
            .iter()
            .find(|(v, _)| v["id"] == id)
            .map(|(_, h)| *h)
    }
}

impl EntityResolver for CountingResolver {
    fn resolve_user(&self, conn: &Connection, actor: &Value) -> Result<ActorHandle> {
        self.users.lock().push(actor.clone());
        SqliteResolver.resolve_user(conn, actor)
    }

    fn resolve_repo(&self, conn: &Connection, repo: &Value) -> Result<RepoHandle> {
        let handle = SqliteResolver.resolve_repo(conn, repo)?;
        self.repos.lock().push((repo.clone(), handle));
        Ok(handle)
    }
}
