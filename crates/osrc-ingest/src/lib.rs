//! osrc ingestion pipeline.
//!
//! Downloads (or reads) hourly activity-archive shards, decodes one event per
//! line, and persists each new event with its actor and repository into a
//! SQLite store.
//!
//! # Modules
//!
//! - [`shard`] - shard addressing (date range or explicit files)
//! - [`source`] - shard byte sources and the streaming gzip line reader
//! - [`pipeline`] - per-record dedupe, normalization and payload enrichment
//! - [`store`] - SQLite event store and entity resolution
//! - [`driver`] - sequential shard loop with per-shard transactions
//! - [`config`] - TOML configuration with environment overrides
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ShardPlan     │  date range → 24 URLs/day, or local files
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  ShardOpener    │  HTTP GET / file open
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  ShardReader    │  multi-member gzip → lines
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   DedupeGate    │  events.id primary key
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ EntityResolver  │  actor, repo, payload repo → handles
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   EventStore    │  one transaction per shard
//! └─────────────────┘
//! ```
//!
//! Re-running over shards that were already ingested is a no-op: the event
//! id decides whether a record is new.

pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod shard;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use config::{Config, FetchConfig};
pub use driver::{IngestDriver, RunStats, ShardStats};
pub use pipeline::{DedupeGate, Enrichment, Normalized};
pub use shard::{ShardId, ShardPlan, Shards, resolve_range};
pub use source::{ShardLine, ShardOpener, ShardReader};
pub use store::{EntityResolver, EventStore, ShardBatch, SqliteResolver, StoredEvent};
