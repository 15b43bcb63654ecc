use std::{collections::BTreeMap, time::Duration};

use dashmap::DashMap;
use fastnum::UD128;

use super::PriceQuote;
use crate::types::Timestamp;

/// How long samples are kept.
pub const RETENTION: Duration = Duration::from_secs(60 * 60);

/// How often expired samples are evicted.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Time-indexed price samples per pair.
///
/// Samples are raw upstream quotes: quote direction is applied on read by
/// the oracle.
#[derive(Debug, Default)]
pub struct PriceCache {
    samples: DashMap<String, BTreeMap<Timestamp, UD128>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample, replacing any previous sample at the same second.
    pub fn insert(&self, pair: &str, at: Timestamp, price: UD128) {
        self.samples
            .entry(pair.to_owned())
            .or_default()
            .insert(at, price);
    }

    /// Most recent sample at or before `at`.
    pub fn latest_at(&self, pair: &str, at: Timestamp) -> Option<PriceQuote> {
        self.samples.get(pair).and_then(|samples| {
            samples
                .range(..=at)
                .next_back()
                .map(|(as_of, value)| PriceQuote {
                    value: *value,
                    as_of: *as_of,
                })
        })
    }

    /// Drops every sample strictly older than `cutoff`, returning how many
    /// were removed.
    pub fn prune_before(&self, cutoff: Timestamp) -> usize {
        let mut removed = 0;
        for mut entry in self.samples.iter_mut() {
            let kept = entry.split_off(&cutoff);
            removed += entry.len();
            *entry = kept;
        }
        self.samples.retain(|_, samples| !samples.is_empty());
        removed
    }

    pub fn clear(&self) {
        self.samples.clear();
    }

    /// Total number of samples across pairs.
    pub fn len(&self) -> usize {
        self.samples.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
