//! Consistency checks over parsed garbage-collector samples.

use crate::{ExpectedKeySet, Sample, keys};
use gc_metrics_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// A `started`/`finished` timestamp pair reported by one collector pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterPair {
    /// Short pass name used in diagnostics.
    pub name: &'static str,
    /// Metric holding the pass start.
    pub started: &'static str,
    /// Metric holding the pass completion.
    pub finished: &'static str,
}

impl CounterPair {
    /// The primary collection pass.
    pub const PRIMARY: Self = Self {
        name: "primary",
        started: keys::STARTED,
        finished: keys::FINISHED,
    };

    /// The write-ahead-log pass.
    pub const WAL: Self = Self {
        name: "wal",
        started: keys::WAL_STARTED,
        finished: keys::WAL_FINISHED,
    };

    /// Every pair checked by [`check_sanity`].
    pub const ALL: [Self; 2] = [Self::PRIMARY, Self::WAL];
}

/// Counters that must strictly increase between two cycles, in check order.
pub const PROGRESSION_COUNTERS: [&str; 3] =
    [keys::STARTED, keys::FINISHED, keys::RUN_CYCLE_COUNT];

/// A broken expectation about one sample or a pair of samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Required metrics are absent from the sample.
    MissingKeys {
        /// Absent metric names, sorted.
        keys: Vec<String>,
    },
    /// A counter needed by a check is absent.
    MissingCounter {
        /// Absent metric name.
        key: &'static str,
    },
    /// A pass started before the test began.
    StartedBeforeTestStart {
        /// Pass name.
        pair: &'static str,
        /// Reported start.
        started: i64,
        /// Test start (ms).
        test_start: u64,
    },
    /// A pass finished before it started.
    FinishedBeforeStarted {
        /// Pass name.
        pair: &'static str,
        /// Reported start.
        started: i64,
        /// Reported completion.
        finished: i64,
    },
    /// A counter did not grow between cycles.
    NotIncreasing {
        /// Metric name.
        counter: &'static str,
        /// Value in the earlier sample.
        earlier: i64,
        /// Value in the later sample.
        later: i64,
    },
}

impl InvariantViolation {
    const fn violation_name(&self) -> &'static str {
        match self {
            Self::MissingKeys { .. } => "missing_keys",
            Self::MissingCounter { .. } => "missing_counter",
            Self::StartedBeforeTestStart { .. } => "started_before_test_start",
            Self::FinishedBeforeStarted { .. } => "finished_before_started",
            Self::NotIncreasing { .. } => "not_increasing",
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeys { keys } => {
                write!(formatter, "sample is missing metrics: {}", keys.join(", "))
            },
            Self::MissingCounter { key } => write!(formatter, "sample is missing counter {key}"),
            Self::StartedBeforeTestStart {
                pair,
                started,
                test_start,
            } => write!(
                formatter,
                "{pair} pass started at {started}, before the test started at {test_start}"
            ),
            Self::FinishedBeforeStarted {
                pair,
                started,
                finished,
            } => write!(
                formatter,
                "{pair} pass finished at {finished}, before it started at {started}"
            ),
            Self::NotIncreasing {
                counter,
                earlier,
                later,
            } => write!(
                formatter,
                "{counter} did not increase between cycles ({earlier} -> {later})"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

impl From<InvariantViolation> for ErrorEnvelope {
    fn from(error: InvariantViolation) -> Self {
        let envelope = Self::invariant(
            ErrorCode::metrics_invariant_violation(),
            error.to_string(),
        )
        .with_metadata("violation", error.violation_name());

        match error {
            InvariantViolation::MissingKeys { keys } => {
                envelope.with_metadata("keys", keys.join(","))
            },
            InvariantViolation::MissingCounter { key } => envelope.with_metadata("key", key),
            InvariantViolation::StartedBeforeTestStart {
                pair,
                started,
                test_start,
            } => envelope
                .with_metadata("pair", pair)
                .with_metadata("started", started.to_string())
                .with_metadata("testStart", test_start.to_string()),
            InvariantViolation::FinishedBeforeStarted {
                pair,
                started,
                finished,
            } => envelope
                .with_metadata("pair", pair)
                .with_metadata("started", started.to_string())
                .with_metadata("finished", finished.to_string()),
            InvariantViolation::NotIncreasing {
                counter,
                earlier,
                later,
            } => envelope
                .with_metadata("counter", counter)
                .with_metadata("earlier", earlier.to_string())
                .with_metadata("later", later.to_string()),
        }
    }
}

/// Returns true if every expected key is present. Extra keys are allowed.
#[must_use]
pub fn check_keys_present(sample: &Sample, expected: &ExpectedKeySet) -> bool {
    expected.iter().all(|key| sample.contains_key(key))
}

/// Expected keys absent from the sample, sorted.
#[must_use]
pub fn missing_keys<'a>(sample: &Sample, expected: &'a ExpectedKeySet) -> Vec<&'a str> {
    expected
        .iter()
        .filter(|key| !sample.contains_key(key))
        .collect()
}

/// Fail with [`InvariantViolation::MissingKeys`] unless every key is present.
pub fn require_keys_present(
    sample: &Sample,
    expected: &ExpectedKeySet,
) -> Result<(), InvariantViolation> {
    let missing = missing_keys(sample, expected);
    if missing.is_empty() {
        return Ok(());
    }
    Err(InvariantViolation::MissingKeys {
        keys: missing.into_iter().map(str::to_owned).collect(),
    })
}

/// Check every counter pair: `started >= test_start` and `finished >= started`.
///
/// A pair with both counters absent is skipped.
pub fn check_sanity(sample: &Sample, test_start_ms: u64) -> Result<(), InvariantViolation> {
    for pair in CounterPair::ALL {
        check_pair(sample, pair, test_start_ms)?;
    }
    Ok(())
}

fn check_pair(
    sample: &Sample,
    pair: CounterPair,
    test_start_ms: u64,
) -> Result<(), InvariantViolation> {
    let (started, finished) = match (sample.get(pair.started), sample.get(pair.finished)) {
        (None, None) => return Ok(()),
        (Some(started), Some(finished)) => (started, finished),
        (None, Some(_)) => return Err(InvariantViolation::MissingCounter { key: pair.started }),
        (Some(_), None) => return Err(InvariantViolation::MissingCounter { key: pair.finished }),
    };

    let before_test = !u64::try_from(started).is_ok_and(|started| started >= test_start_ms);
    if before_test {
        return Err(InvariantViolation::StartedBeforeTestStart {
            pair: pair.name,
            started,
            test_start: test_start_ms,
        });
    }
    if finished < started {
        return Err(InvariantViolation::FinishedBeforeStarted {
            pair: pair.name,
            started,
            finished,
        });
    }
    Ok(())
}

/// Check that each [`PROGRESSION_COUNTERS`] entry strictly grew from `earlier`
/// to `later`. The first failing counter is reported.
pub fn check_progression(earlier: &Sample, later: &Sample) -> Result<(), InvariantViolation> {
    for counter in PROGRESSION_COUNTERS {
        let before = require_counter(earlier, counter)?;
        let after = require_counter(later, counter)?;
        if after <= before {
            return Err(InvariantViolation::NotIncreasing {
                counter,
                earlier: before,
                later: after,
            });
        }
    }
    Ok(())
}

fn require_counter(sample: &Sample, key: &'static str) -> Result<i64, InvariantViolation> {
    sample
        .get(key)
        .ok_or(InvariantViolation::MissingCounter { key })
}
