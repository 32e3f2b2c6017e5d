//! Per-record pipeline stages.
//!
//! - [`DedupeGate`] - existence check and insert-or-ignore on the event id
//! - [`normalize`] - decoded record to stored [`osrc_core::Event`]
//! - [`enrich`] - type-specific payload resolution
//!
//! # Architecture
//!
//! ```text
//! RawEvent → DedupeGate → resolve actor/repo → insert → enrich
//!               ↓                                  ↓
//!           Duplicate                         events table
//! ```

mod dedupe;
mod dispatch;
mod normalize;

pub use dedupe::DedupeGate;
pub use dispatch::{Enrichment, enrich, forkee, pull_request_base_repo};
pub use normalize::{Normalized, normalize};
