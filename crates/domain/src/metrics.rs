//! Metric samples and the expected garbage-collector key set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Prefix shared by every garbage-collector metric.
pub const GC_METRIC_PREFIX: &str = "AccGc";

/// Garbage-collector metric names.
pub mod keys {
    /// Candidates found by the primary collection pass.
    pub const CANDIDATES: &str = "AccGcCandidates";
    /// Entries deleted by the primary collection pass.
    pub const DELETED: &str = "AccGcDeleted";
    /// Errors raised by the primary collection pass.
    pub const ERRORS: &str = "AccGcErrors";
    /// Timestamp (ms) of the last primary cycle completion.
    pub const FINISHED: &str = "AccGcFinished";
    /// Candidates skipped because they were in use.
    pub const IN_USE: &str = "AccGcInUse";
    /// Duration of the post-operation step.
    pub const POST_OP_DURATION: &str = "AccGcPostOpDuration";
    /// Number of completed collection cycles.
    pub const RUN_CYCLE_COUNT: &str = "AccGcRunCycleCount";
    /// Timestamp (ms) of the last primary cycle start.
    pub const STARTED: &str = "AccGcStarted";
    /// Candidates found by the write-ahead-log pass.
    pub const WAL_CANDIDATES: &str = "AccGcWalCandidates";
    /// Entries deleted by the write-ahead-log pass.
    pub const WAL_DELETED: &str = "AccGcWalDeleted";
    /// Errors raised by the write-ahead-log pass.
    pub const WAL_ERRORS: &str = "AccGcWalErrors";
    /// Timestamp (ms) of the last write-ahead-log pass completion.
    pub const WAL_FINISHED: &str = "AccGcWalFinished";
    /// Write-ahead logs skipped because they were in use.
    pub const WAL_IN_USE: &str = "AccGcWalInUse";
    /// Timestamp (ms) of the last write-ahead-log pass start.
    pub const WAL_STARTED: &str = "AccGcWalStarted";
}

/// The fourteen keys every garbage-collector report carries, sorted.
pub const GC_EXPECTED_KEYS: [&str; 14] = [
    keys::CANDIDATES,
    keys::DELETED,
    keys::ERRORS,
    keys::FINISHED,
    keys::IN_USE,
    keys::POST_OP_DURATION,
    keys::RUN_CYCLE_COUNT,
    keys::STARTED,
    keys::WAL_CANDIDATES,
    keys::WAL_DELETED,
    keys::WAL_ERRORS,
    keys::WAL_FINISHED,
    keys::WAL_IN_USE,
    keys::WAL_STARTED,
];

/// One parsed metrics report: metric name to value, keys unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    values: BTreeMap<String, i64>,
}

impl Sample {
    /// Create an empty sample.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Insert a value, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: i64) -> Option<i64> {
        self.values.insert(key.into(), value)
    }

    /// Look up a metric value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    /// Returns true if the metric is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of metrics in the sample.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the sample has no metrics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate metric names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate `(name, value)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        let mut sample = Self::new();
        for (key, value) in iter {
            sample.insert(key, value);
        }
        sample
    }
}

impl IntoIterator for Sample {
    type Item = (String, i64);
    type IntoIter = btree_map::IntoIter<String, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Metric names a report must contain. Sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedKeySet {
    keys: Vec<Box<str>>,
}

impl ExpectedKeySet {
    /// Build a key set; blank names are dropped, the rest trimmed.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<Box<str>> = keys
            .into_iter()
            .map(|key| key.as_ref().trim().to_owned())
            .filter(|key| !key.is_empty())
            .map(String::into_boxed_str)
            .collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    /// The garbage collector's fourteen keys.
    #[must_use]
    pub fn gc_default() -> Self {
        Self::new(GC_EXPECTED_KEYS)
    }

    /// Iterate key names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| &**key)
    }

    /// Returns true if the key is required.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .binary_search_by(|candidate| (**candidate).cmp(key))
            .is_ok()
    }

    /// Number of required keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true when nothing is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for ExpectedKeySet {
    fn default() -> Self {
        Self::gc_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_set_has_fourteen_prefixed_keys() {
        let expected = ExpectedKeySet::default();
        assert_eq!(expected.len(), 14);
        assert!(expected.iter().all(|key| key.starts_with(GC_METRIC_PREFIX)));
        assert!(expected.contains(keys::RUN_CYCLE_COUNT));
        assert!(!expected.contains("AccGcUnknown"));
    }

    #[test]
    fn key_set_trims_sorts_and_dedups() {
        let expected = ExpectedKeySet::new([" AccGcB", "AccGcA", "AccGcB", "  "]);
        assert_eq!(expected.iter().collect::<Vec<_>>(), vec!["AccGcA", "AccGcB"]);
    }

    #[test]
    fn sample_keeps_last_inserted_value() {
        let mut sample = Sample::new();
        sample.insert(keys::STARTED, 1);
        assert_eq!(sample.insert(keys::STARTED, 2), Some(1));
        assert_eq!(sample.get(keys::STARTED), Some(2));
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn sample_serializes_as_flat_map() -> Result<(), serde_json::Error> {
        let sample: Sample = [(keys::STARTED, 10), (keys::FINISHED, 12)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&sample)?;
        assert_eq!(json, r#"{"AccGcFinished":12,"AccGcStarted":10}"#);
        Ok(())
    }
}
