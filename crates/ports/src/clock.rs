//! Time boundary contract.

use crate::BoxFuture;
use gc_metrics_shared::{RequestContext, Result};
use std::time::Duration;

/// Source of wall-clock readings and cancellable sleeps.
pub trait ClockPort: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_epoch_ms(&self) -> u64;

    /// Sleep for `duration`.
    ///
    /// Implementations MUST return a cancellation error (`core:cancelled`) when
    /// `ctx` is cancelled before or during the sleep.
    fn sleep(&self, ctx: &RequestContext, duration: Duration) -> BoxFuture<'_, Result<()>>;
}
