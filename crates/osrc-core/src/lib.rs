//! Core types and shared utilities for the osrc archive ingester.
//!
//! This crate provides:
//! - The archive record model ([`RawEvent`]) and the normalized [`Event`]
//! - Event type tags ([`EventKind`]) with a catch-all for unknown types
//! - Timestamp parsing and derived day-of-week / hour-of-day fields
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod event;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Default base URL of the hourly activity archive.
pub const DEFAULT_ARCHIVE_URL: &str = "https://data.gharchive.org";

/// Number of shards published per archive day.
pub const SHARDS_PER_DAY: u32 = 24;

pub use error::{Error, Result};
pub use event::{
    ActorHandle, Event, EventKind, RawEvent, RepoHandle, day_and_hour, parse_timestamp,
};
