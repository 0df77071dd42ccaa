use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{RankError, Result};

/// Recency marker attached to every indexed entry.
pub type Stamp = u64;

pub const CAPACITY_ENV: &str = "RANKMAP_CAPACITY";
pub const STAMP_ENV: &str = "RANKMAP_STAMP";

/// Where the recency marker of an upsert comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StampSource {
    /// Monotonic per-map counter. Every upsert gets a distinct stamp.
    #[default]
    Sequence,
    /// Milliseconds since the Unix epoch, clamped so it never goes backwards.
    /// Upserts landing in the same millisecond share a stamp and fall back to
    /// key order.
    WallClock,
}

impl FromStr for StampSource {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("sequence") || s.eq_ignore_ascii_case("seq") {
            Ok(Self::Sequence)
        } else if s.eq_ignore_ascii_case("wall-clock") || s.eq_ignore_ascii_case("clock") {
            Ok(Self::WallClock)
        } else {
            Err(RankError::UnknownStampSource(s.to_owned()))
        }
    }
}

/// Runtime construction options for a [`RankMap`](crate::RankMap).
///
/// Ordering is configured at the type level through the map's `O` and `T`
/// parameters; this only carries the knobs that can change per instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankConfig {
    pub capacity: usize,
    pub stamp_source: StampSource,
}

impl RankConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn stamp_source(mut self, source: StampSource) -> Self {
        self.stamp_source = source;
        self
    }

    /// Reads `RANKMAP_CAPACITY` and `RANKMAP_STAMP`, keeping defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(CAPACITY_ENV) {
            config.capacity = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| RankError::InvalidEnv {
                    var: CAPACITY_ENV,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(raw) = lookup(STAMP_ENV) {
            config.stamp_source = raw.trim().parse().map_err(|_| RankError::InvalidEnv {
                var: STAMP_ENV,
                value: raw.clone(),
                reason: "expected `sequence` or `wall-clock`".to_owned(),
            })?;
        }
        Ok(config)
    }
}

/// Hands out non-decreasing stamps for one map.
#[derive(Clone, Debug)]
pub(crate) struct StampClock {
    source: StampSource,
    last: Stamp,
}

impl StampClock {
    pub(crate) fn new(source: StampSource) -> Self {
        Self { source, last: 0 }
    }

    pub(crate) fn source(&self) -> StampSource {
        self.source
    }

    pub(crate) fn next(&mut self) -> Stamp {
        self.last = match self.source {
            StampSource::Sequence => self.last.wrapping_add(1),
            StampSource::WallClock => now_millis().max(self.last),
        };
        self.last
    }
}

fn now_millis() -> Stamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Stamp)
        .unwrap_or(0)
}
