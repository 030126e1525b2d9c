//! System clock adapter backed by the tokio timer.

use gc_metrics_ports::{BoxFuture, ClockPort};
use gc_metrics_shared::{ErrorEnvelope, RequestContext, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall clock with cancellation-aware sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now_epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|duration| u64::try_from(duration.as_millis()).ok())
            .unwrap_or_default()
    }

    fn sleep(&self, ctx: &RequestContext, duration: Duration) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("clock.sleep")?;
            tokio::select! {
                () = ctx.cancelled() => Err(
                    ErrorEnvelope::cancelled("sleep cancelled")
                        .with_metadata("operation", "clock.sleep"),
                ),
                () = tokio::time::sleep(duration) => Ok(()),
            }
        })
    }
}
