//! Shard byte sources.
//!
//! Local shards are opened from disk. Remote shards are requested with a
//! blocking `reqwest` client and streamed straight into the gzip decoder; the
//! body is never buffered whole.

use crate::config::FetchConfig;
use crate::shard::ShardId;
use crate::{Error, Result};
use metrics::counter;
use reqwest::blocking::{Client, Response};
use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use tracing::{debug, warn};

/// Opens shards as readable byte streams.
pub struct ShardOpener {
    client: Client,
    config: FetchConfig,
}

impl ShardOpener {
    /// Build an opener with an HTTP client configured from `config`.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("osrc-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Build an opener around an existing client.
    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Open `shard` for reading.
    ///
    /// A remote shard is requested once per configured attempt. Any status
    /// outside 2xx is a [`Error::Transport`]; client errors (4xx) are never
    /// retried. Once a response is returned its body is streamed; a network
    /// failure while reading it is tagged with [`BodyReadError`] so the
    /// reader can report it as a transport failure.
    pub fn open(&self, shard: &ShardId) -> Result<Box<dyn Read + Send>> {
        match shard {
            ShardId::Local(path) => {
                let file = File::open(path).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("cannot open shard {}: {}", path.display(), e),
                    ))
                })?;
                Ok(Box::new(file))
            }
            ShardId::Remote { url, .. } => Ok(Box::new(RemoteBody(self.fetch(url)?))),
        }
    }

    fn fetch(&self, url: &str) -> Result<Response> {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("GET {} (attempt {}/{})", url, attempt, attempts);

            let err = match self.client.get(url).send() {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => FetchFailure::Status(resp.status()),
                Err(e) => FetchFailure::Request(e),
            };

            counter!("ingest_fetch_errors_total").increment(1);

            if attempt >= attempts || !err.is_retryable() {
                return Err(Error::Transport {
                    shard: url.to_string(),
                    reason: err.to_string(),
                });
            }

            let delay = self.config.backoff() * attempt;
            warn!(
                "Fetch of {} failed ({}); retrying in {:?} (attempt {}/{})",
                url,
                err,
                delay,
                attempt + 1,
                attempts
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

/// A response body whose read errors carry a [`BodyReadError`].
struct RemoteBody(Response);

impl Read for RemoteBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            if e.kind() == ErrorKind::Interrupted {
                return e;
            }
            counter!("ingest_fetch_errors_total").increment(1);
            io::Error::new(e.kind(), BodyReadError(error_chain(&e)))
        })
    }
}

/// The connection failed while a response body was being streamed.
#[derive(Debug)]
pub(crate) struct BodyReadError(String);

impl BodyReadError {
    /// The failure and every cause under it, outermost first.
    pub(crate) fn reason(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BodyReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BodyReadError {}

/// `e` followed by its source chain, joined with `": "`.
fn error_chain(e: &io::Error) -> String {
    let mut reason = e.to_string();
    let mut cause = e.get_ref().and_then(|inner| inner.source());
    while let Some(err) = cause {
        reason.push_str(": ");
        reason.push_str(&err.to_string());
        cause = err.source();
    }
    reason
}

enum FetchFailure {
    Status(reqwest::StatusCode),
    Request(reqwest::Error),
}

impl FetchFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(status) => !status.is_client_error(),
            Self::Request(_) => true,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP status {}", status),
            Self::Request(e) => write!(f, "request failed: {}", e),
        }
    }
}
