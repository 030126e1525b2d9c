//! Published-update boundary contract.

use gc_metrics_domain::{RawUpdate, VersionMarker};
use std::sync::Arc;

/// Read side of a tailer: the most recently published line.
///
/// Every call observes one consistent snapshot.
pub trait UpdateSourcePort: Send + Sync {
    /// Current snapshot.
    fn latest(&self) -> RawUpdate;

    /// Line of the current snapshot.
    fn latest_line(&self) -> Option<Box<str>> {
        self.latest().line
    }

    /// Marker of the current snapshot.
    fn latest_version(&self) -> VersionMarker {
        self.latest().version
    }
}

impl<T> UpdateSourcePort for Arc<T>
where
    T: UpdateSourcePort + ?Sized,
{
    fn latest(&self) -> RawUpdate {
        (**self).latest()
    }
}
