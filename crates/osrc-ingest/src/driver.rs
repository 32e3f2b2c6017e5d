//! Ingestion driver.
//!
//! Walks an ordered sequence of shards, one at a time:
//!
//! ```text
//! open shard ──► stream records ──► commit ──► next shard
//!     │                │                           │
//!  Transport     record error: roll back the       stop flag cleared:
//!  (no batch)    record's savepoint, count it,     end the run
//!                continue (or abort the shard)
//!                      │
//!                shard error: commit what was
//!                written, surface the error
//! ```
//!
//! A shard's records share one transaction. Each record runs in its own
//! savepoint, so a rejected record never leaves half-written rows, and a
//! shard-level failure still keeps every record that completed before it.

use crate::pipeline::{Enrichment, Normalized, normalize};
use crate::shard::ShardId;
use crate::source::{ShardOpener, ShardReader};
use crate::store::{EntityResolver, EventStore, ShardBatch};
use crate::{Error, Result};
use metrics::{counter, gauge, histogram};
use osrc_core::RawEvent;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Counters for one shard.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShardStats {
    /// Non-blank lines read.
    pub records: u64,
    /// New events stored.
    pub inserted: u64,
    /// Records whose id was already stored.
    pub duplicates: u64,
    /// Records rejected as malformed.
    pub malformed: u64,
    /// Records rejected by entity resolution.
    pub unresolved: u64,
    /// Payload repositories resolved.
    pub enriched: u64,
    /// Enrichable events whose payload lacked the repository.
    pub enrichment_missing: u64,
    /// Decompressed bytes read.
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ShardStats {
    /// Records rejected for any reason.
    pub fn invalid(&self) -> u64 {
        self.malformed + self.unresolved
    }
}

/// Counters for a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Shards committed without a shard-level error.
    pub shards_processed: u64,
    /// Shards that ended with a shard-level error (at most one per run).
    pub shards_failed: u64,
    pub records: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub unresolved: u64,
    pub enriched: u64,
    pub enrichment_missing: u64,
    pub bytes: u64,
    /// Whether the run ended early because a stop was requested.
    pub stopped: bool,
}

impl RunStats {
    pub fn invalid(&self) -> u64 {
        self.malformed + self.unresolved
    }

    fn absorb(&mut self, shard: &ShardStats) {
        self.records += shard.records;
        self.inserted += shard.inserted;
        self.duplicates += shard.duplicates;
        self.malformed += shard.malformed;
        self.unresolved += shard.unresolved;
        self.enriched += shard.enriched;
        self.enrichment_missing += shard.enrichment_missing;
        self.bytes += shard.bytes;
    }
}

/// Sequential shard driver.
pub struct IngestDriver<'a, R: EntityResolver> {
    store: &'a EventStore,
    resolver: &'a R,
    opener: &'a ShardOpener,
    continue_on_error: bool,
    running: Arc<AtomicBool>,
}

impl<'a, R: EntityResolver> IngestDriver<'a, R> {
    pub fn new(store: &'a EventStore, resolver: &'a R, opener: &'a ShardOpener) -> Self {
        Self {
            store,
            resolver,
            opener,
            continue_on_error: true,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Skip failing records (`true`, default) or abort the shard on the first one.
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Share a run flag; clearing it ends the run after the current shard.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Ingest `shards` in order.
    ///
    /// Stops at the first shard-level error and returns it; every shard before
    /// it, and the records of the failing shard read before the error, stay
    /// committed. `stats` is updated as shards complete, so it is accurate on
    /// both the success and the error path.
    pub fn run<I>(&self, shards: I, stats: &mut RunStats) -> Result<()>
    where
        I: IntoIterator<Item = ShardId>,
    {
        gauge!("ingest_running").set(1.0);
        let result = self.run_shards(shards, stats);
        gauge!("ingest_running").set(0.0);
        result
    }

    fn run_shards<I>(&self, shards: I, stats: &mut RunStats) -> Result<()>
    where
        I: IntoIterator<Item = ShardId>,
    {
        for shard in shards {
            if !self.running.load(Ordering::SeqCst) {
                info!("Stop requested, ending run before {}", shard);
                stats.stopped = true;
                break;
            }

            let mut shard_stats = ShardStats::default();
            let outcome = self.ingest_shard(&shard, &mut shard_stats);
            stats.absorb(&shard_stats);
            record_shard_metrics(&shard_stats);

            match outcome {
                Ok(()) => {
                    stats.shards_processed += 1;
                    counter!("ingest_shards_total").increment(1);
                    info!(
                        shard = %shard,
                        records = shard_stats.records,
                        inserted = shard_stats.inserted,
                        duplicates = shard_stats.duplicates,
                        invalid = shard_stats.invalid(),
                        "... processed {} events in {:.2} seconds",
                        shard_stats.records,
                        shard_stats.elapsed.as_secs_f64()
                    );
                }
                Err(e) => {
                    stats.shards_failed += 1;
                    error!(
                        shard = %shard,
                        records = shard_stats.records,
                        inserted = shard_stats.inserted,
                        "Shard failed after committing {} new events: {}",
                        shard_stats.inserted,
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Ingest one shard into its own transaction.
    ///
    /// A transport failure happens before any transaction is opened. Any later
    /// failure commits what was written and is returned.
    pub fn ingest_shard(&self, shard: &ShardId, stats: &mut ShardStats) -> Result<()> {
        let started = Instant::now();
        info!("Processing: {}", shard);

        let source = match self.opener.open(shard) {
            Ok(source) => source,
            Err(e) => {
                stats.elapsed = started.elapsed();
                return Err(e);
            }
        };

        let mut reader = ShardReader::new(shard.to_string(), source);
        let result = self
            .store
            .with_shard_batch(|batch| self.stream_records(shard, batch, &mut reader, stats));

        stats.bytes = reader.bytes_read();
        stats.elapsed = started.elapsed();
        result
    }

    fn stream_records<S: Read>(
        &self,
        shard: &ShardId,
        batch: &mut ShardBatch<'_>,
        reader: &mut ShardReader<S>,
        stats: &mut ShardStats,
    ) -> Result<()> {
        for line in reader {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.is_record_level() => {
                    stats.records += 1;
                    self.reject(shard, None, None, e, stats)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            stats.records += 1;

            let raw = match RawEvent::from_line(&line.text) {
                Ok(raw) => raw,
                Err(e) => {
                    self.reject(shard, Some(line.number), None, e.into(), stats)?;
                    continue;
                }
            };
            let event_id = raw.id.clone();

            match batch.record(|conn| normalize(conn, self.resolver, raw)) {
                Ok(Normalized::Inserted { enrichment, .. }) => {
                    stats.inserted += 1;
                    match enrichment {
                        Enrichment::Resolved => stats.enriched += 1,
                        Enrichment::MissingPayload => stats.enrichment_missing += 1,
                        Enrichment::None => {}
                    }
                }
                Ok(Normalized::Duplicate) => {
                    stats.duplicates += 1;
                    debug!("Duplicate event {} in {}", event_id, shard);
                }
                Err(e) if e.is_record_level() => {
                    self.reject(shard, Some(line.number), Some(&event_id), e, stats)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Count and log a rejected record. Returns the error back unless records
    /// are being skipped.
    fn reject(
        &self,
        shard: &ShardId,
        line: Option<usize>,
        event_id: Option<&str>,
        err: Error,
        stats: &mut ShardStats,
    ) -> Result<()> {
        match err {
            Error::EntityResolution(_) => stats.unresolved += 1,
            _ => stats.malformed += 1,
        }

        warn!(
            shard = %shard,
            line = line.unwrap_or_default(),
            event_id = event_id.unwrap_or("-"),
            "Skipping record: {}",
            err
        );

        if self.continue_on_error {
            Ok(())
        } else {
            Err(err)
        }
    }
}

fn record_shard_metrics(stats: &ShardStats) {
    counter!("ingest_events_total").increment(stats.records);
    counter!("ingest_events_inserted_total").increment(stats.inserted);
    counter!("ingest_events_duplicate_total").increment(stats.duplicates);
    counter!("ingest_events_invalid_total").increment(stats.invalid());
    counter!("ingest_bytes_total").increment(stats.bytes);
    histogram!("ingest_shard_duration_seconds").record(stats.elapsed.as_secs_f64());
}
