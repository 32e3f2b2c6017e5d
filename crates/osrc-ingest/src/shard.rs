//! Shard address resolution.
//!
//! A shard is one hour of archive data. Shards are addressed either by an
//! explicit local path or by a remote URL derived from a date and an hour:
//!
//! ```text
//! {base}/{YYYY}-{MM}-{DD}-{H}.json.gz      e.g. 2015-01-01-15.json.gz
//! ```
//!
//! Month and day are zero-padded; the hour is not, matching the archive's
//! published file names.

use chrono::{Datelike, NaiveDate};
use osrc_core::SHARDS_PER_DAY;
use std::fmt;
use std::path::PathBuf;

/// Fully-specified shard locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardId {
    /// A pre-supplied local file.
    Local(PathBuf),
    /// A remote archive shard for one hour of one day.
    Remote {
        url: String,
        date: NaiveDate,
        hour: u32,
    },
}

impl ShardId {
    /// Build the remote shard for `date` and `hour` under `base_url`.
    pub fn remote(base_url: &str, date: NaiveDate, hour: u32) -> Self {
        let url = format!(
            "{}/{:04}-{:02}-{:02}-{}.json.gz",
            base_url.trim_end_matches('/'),
            date.year(),
            date.month(),
            date.day(),
            hour
        );
        Self::Remote { url, date, hour }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { url, .. } => f.write_str(url),
        }
    }
}

/// What a run should ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPlan {
    /// Explicit local files, processed in the order given. Bypasses date resolution.
    Files(Vec<PathBuf>),
    /// Every hour of every day in `[since, until)`.
    Range { since: NaiveDate, until: NaiveDate },
}

impl ShardPlan {
    /// Resolve the plan into an ordered, lazy sequence of shards.
    pub fn shards(self, base_url: &str) -> Shards {
        match self {
            Self::Files(files) => Shards::Files(files.into_iter()),
            Self::Range { since, until } => Shards::Range(resolve_range(base_url, since, until)),
        }
    }
}

/// Iterator over the shards of a [`ShardPlan`].
pub enum Shards {
    Files(std::vec::IntoIter<PathBuf>),
    Range(ShardRange),
}

impl Iterator for Shards {
    type Item = ShardId;

    fn next(&mut self) -> Option<ShardId> {
        match self {
            Self::Files(files) => files.next().map(ShardId::Local),
            Self::Range(range) => range.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Files(files) => files.size_hint(),
            Self::Range(range) => range.size_hint(),
        }
    }
}

/// Lazy, chronologically ordered remote shards for a date range.
#[derive(Debug, Clone)]
pub struct ShardRange {
    base_url: String,
    day: NaiveDate,
    hour: u32,
    until: NaiveDate,
}

/// Resolve `[since, until)` into 24 remote shards per day, hour 0 first.
///
/// `since >= until` yields nothing. No upper bound is applied to the range.
pub fn resolve_range(base_url: &str, since: NaiveDate, until: NaiveDate) -> ShardRange {
    ShardRange {
        base_url: base_url.to_string(),
        day: since,
        hour: 0,
        until,
    }
}

impl Iterator for ShardRange {
    type Item = ShardId;

    fn next(&mut self) -> Option<ShardId> {
        if self.day >= self.until {
            return None;
        }

        let shard = ShardId::remote(&self.base_url, self.day, self.hour);

        self.hour += 1;
        if self.hour == SHARDS_PER_DAY {
            self.hour = 0;
            // NaiveDate::MAX has no successor; treat it as the end of the range.
            self.day = self.day.succ_opt().unwrap_or(self.until);
        }

        Some(shard)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.day >= self.until {
            return (0, Some(0));
        }
        let days = (self.until - self.day).num_days() as usize;
        let remaining = days * SHARDS_PER_DAY as usize - self.hour as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://data.gharchive.org";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_two_day_range_yields_48_ordered_shards() {
        let shards: Vec<_> = resolve_range(BASE, date(2015, 1, 1), date(2015, 1, 3)).collect();
        assert_eq!(shards.len(), 48);

        let keys: Vec<(NaiveDate, u32)> = shards
            .iter()
            .map(|s| match s {
                ShardId::Remote { date, hour, .. } => (*date, *hour),
                ShardId::Local(_) => panic!("expected remote shard"),
            })
            .collect();

        // Strictly increasing
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        // Hours 0..=23 on each day
        for day in [date(2015, 1, 1), date(2015, 1, 2)] {
            let hours: Vec<u32> = keys
                .iter()
                .filter(|(d, _)| *d == day)
                .map(|(_, h)| *h)
                .collect();
            assert_eq!(hours, (0..24).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_empty_range() {
        let day = date(2015, 1, 1);
        assert_eq!(resolve_range(BASE, day, day).count(), 0);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert_eq!(
            resolve_range(BASE, date(2015, 1, 5), date(2015, 1, 1)).count(),
            0
        );
    }

    #[test]
    fn test_remote_url_format() {
        let shard = ShardId::remote(BASE, date(2015, 1, 1), 5);
        assert_eq!(
            shard.to_string(),
            "https://data.gharchive.org/2015-01-01-5.json.gz"
        );

        let shard = ShardId::remote("http://mirror.local/archive/", date(2014, 11, 9), 23);
        assert_eq!(
            shard.to_string(),
            "http://mirror.local/archive/2014-11-09-23.json.gz"
        );
    }

    #[test]
    fn test_range_crosses_month_boundary() {
        let shards: Vec<_> = resolve_range(BASE, date(2015, 1, 31), date(2015, 2, 1)).collect();
        assert_eq!(shards.len(), 24);
        assert!(shards[0].to_string().ends_with("2015-01-31-0.json.gz"));
        assert!(shards[23].to_string().ends_with("2015-01-31-23.json.gz"));
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let mut range = resolve_range(BASE, date(2015, 1, 1), date(2015, 1, 3));
        assert_eq!(range.size_hint(), (48, Some(48)));
        range.next();
        range.next();
        assert_eq!(range.size_hint(), (46, Some(46)));
    }

    #[test]
    fn test_files_plan_preserves_order() {
        let files = vec![
            PathBuf::from("z.json.gz"),
            PathBuf::from("a.json.gz"),
            PathBuf::from("m.json.gz"),
        ];
        let shards: Vec<_> = ShardPlan::Files(files.clone()).shards(BASE).collect();
        assert_eq!(
            shards,
            files.into_iter().map(ShardId::Local).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_range_plan_resolves_remote() {
        let plan = ShardPlan::Range {
            since: date(2015, 1, 1),
            until: date(2015, 1, 2),
        };
        let shards: Vec<_> = plan.shards(BASE).collect();
        assert_eq!(shards.len(), 24);
        assert!(matches!(shards[0], ShardId::Remote { hour: 0, .. }));
    }
}
