//! Published tailer updates and the baselines waiters compare them against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic marker identifying one published line.
///
/// `NONE` means nothing was published yet; publishes count up from 1.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionMarker(u64);

impl VersionMarker {
    /// Marker of the initial, unpublished state.
    pub const NONE: Self = Self(0);

    /// Wrap a raw marker value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw marker value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for the unpublished marker.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Marker for the following publish.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "v{}", self.0)
    }
}

/// What a waiter already has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "version")]
pub enum Baseline {
    /// Nothing seen yet: the first observed line is accepted.
    #[default]
    None,
    /// Only a line published after this marker is accepted.
    Version(VersionMarker),
}

impl Baseline {
    /// Baseline that accepts only updates newer than `update`.
    #[must_use]
    pub const fn after(update: &RawUpdate) -> Self {
        Self::Version(update.version)
    }

    /// Returns true if `version` is new relative to this baseline.
    #[must_use]
    pub fn accepts(self, version: VersionMarker) -> bool {
        match self {
            Self::None => true,
            Self::Version(seen) => version != seen,
        }
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => formatter.write_str("none"),
            Self::Version(version) => version.fmt(formatter),
        }
    }
}

/// Snapshot of the last line the tailer saw, with its marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUpdate {
    /// Marker assigned at publish time.
    pub version: VersionMarker,
    /// Last non-empty line of the file, if any was seen.
    pub line: Option<Box<str>>,
    /// Clock reading when the line was published.
    pub observed_at_ms: u64,
}

impl RawUpdate {
    /// Initial snapshot: nothing published.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            version: VersionMarker::NONE,
            line: None,
            observed_at_ms: 0,
        }
    }

    /// Create a published snapshot.
    pub fn new(version: VersionMarker, line: impl Into<Box<str>>, observed_at_ms: u64) -> Self {
        Self {
            version,
            line: Some(line.into()),
            observed_at_ms,
        }
    }

    /// Borrow the line.
    #[must_use]
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }

    /// Returns true when a line is present.
    #[must_use]
    pub const fn has_line(&self) -> bool {
        self.line.is_some()
    }
}

impl Default for RawUpdate {
    fn default() -> Self {
        Self::empty()
    }
}
