//! Shard sources.
//!
//! A shard is turned into records in two steps:
//!
//! - [`ShardOpener`] acquires the raw byte stream (local file or HTTP body)
//! - [`ShardReader`] decompresses it and yields one line at a time
//!
//! Both halves are lazy. Records are handed to the pipeline as they are read.

mod fetch;
mod reader;

pub use fetch::ShardOpener;
pub use reader::{ShardLine, ShardReader};
