//! Bounded wait for the next published metrics line.
//!
//! The wait is an explicit state machine. `WaitState::observe` is a pure
//! transition over one snapshot; the async driver only adds the sleeps and the
//! cancellation checks, so the attempt accounting is testable without a clock.

use gc_metrics_domain::{Baseline, RawUpdate};
use gc_metrics_ports::{ClockPort, LoggerPort, UpdateSourcePort, log_fields};
use gc_metrics_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const OPERATION: &str = "wait_for_update";

/// Retry policy: `max_attempts` snapshots, `delay` after each miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl WaitPolicy {
    /// Build a policy. A zero attempt count is raised to one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Maximum number of snapshots taken.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after each unsuccessful snapshot.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Worst-case wait: `max_attempts * delay`.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.delay.saturating_mul(self.max_attempts)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(5))
    }
}

/// State of one wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    /// About to take snapshot number `attempt` (1-based).
    Polling {
        /// Attempt number.
        attempt: u32,
    },
    /// A new line was observed.
    Succeeded(RawUpdate),
    /// Every attempt missed.
    TimedOut {
        /// Attempts made.
        attempts: u32,
    },
    /// The wait was cancelled during `attempt`.
    Cancelled {
        /// Attempt in progress.
        attempt: u32,
    },
}

impl WaitState {
    /// Initial state.
    #[must_use]
    pub const fn start() -> Self {
        Self::Polling { attempt: 1 }
    }

    /// Apply one snapshot.
    ///
    /// From `Polling`, an accepted snapshot succeeds; a miss moves to the next
    /// attempt, or to `TimedOut` when the budget is spent. Terminal states are
    /// returned unchanged. Any non-`Succeeded` result is followed by a sleep.
    #[must_use]
    pub fn observe(self, baseline: Baseline, policy: &WaitPolicy, snapshot: RawUpdate) -> Self {
        match self {
            Self::Polling { attempt } => {
                if snapshot.has_line() && baseline.accepts(snapshot.version) {
                    Self::Succeeded(snapshot)
                } else if attempt >= policy.max_attempts() {
                    Self::TimedOut { attempts: attempt }
                } else {
                    Self::Polling {
                        attempt: attempt + 1,
                    }
                }
            },
            terminal => terminal,
        }
    }

    /// Cancel a wait in progress.
    #[must_use]
    pub fn cancel(self, in_flight_attempt: u32) -> Self {
        match self {
            Self::Polling { .. } | Self::TimedOut { .. } => Self::Cancelled {
                attempt: in_flight_attempt,
            },
            terminal => terminal,
        }
    }

    /// Returns true for `Succeeded`, `TimedOut`, and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Polling { .. })
    }
}

/// Dependencies for `wait_for_update`.
#[derive(Clone)]
pub struct WaitForUpdateDeps {
    /// Where snapshots come from (usually a tailer handle).
    pub source: Arc<dyn UpdateSourcePort>,
    /// Clock used for sleeps and elapsed time.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Input for `wait_for_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitForUpdateInput {
    /// Version that does not count as new.
    pub baseline: Baseline,
    /// Retry policy.
    pub policy: WaitPolicy,
}

/// Wait until the source publishes a line newer than `input.baseline`.
///
/// Fails with `core:timeout` once `max_attempts` snapshots missed (worst case
/// `max_attempts * delay`), or `core:cancelled` when `ctx` is cancelled.
pub async fn wait_for_update(
    ctx: &RequestContext,
    deps: &WaitForUpdateDeps,
    input: WaitForUpdateInput,
) -> Result<RawUpdate> {
    let WaitForUpdateInput { baseline, policy } = input;
    let started_ms = deps.clock.now_epoch_ms();
    let mut state = WaitState::start();

    loop {
        let WaitState::Polling { attempt } = state else {
            break;
        };
        if ctx.is_cancelled() {
            state = state.cancel(attempt);
            break;
        }

        state = state.observe(baseline, &policy, deps.source.latest());
        if matches!(state, WaitState::Succeeded(_)) {
            break;
        }

        match deps.clock.sleep(ctx, policy.delay()).await {
            Ok(()) => {},
            Err(error) if error.is_cancelled() => {
                state = state.cancel(attempt);
                break;
            },
            Err(error) => return Err(error),
        }
        if matches!(state, WaitState::TimedOut { .. }) {
            break;
        }
    }

    let elapsed_ms = deps.clock.now_epoch_ms().saturating_sub(started_ms);
    match state {
        WaitState::Succeeded(update) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.debug(
                    "waiter.update_received",
                    "Metrics update received",
                    Some(log_fields([
                        ("version", Value::from(update.version.get())),
                        ("baseline", Value::from(baseline.to_string())),
                        ("elapsedMs", Value::from(elapsed_ms)),
                    ])),
                );
            }
            Ok(update)
        },
        WaitState::TimedOut { attempts } => {
            let error = timeout_error(attempts, elapsed_ms, baseline, &policy);
            if let Some(logger) = deps.logger.as_ref() {
                logger.warn(
                    "waiter.timed_out",
                    &error.message,
                    Some(log_fields([
                        ("attempts", attempts.to_string()),
                        ("elapsedMs", elapsed_ms.to_string()),
                        ("baseline", baseline.to_string()),
                    ])),
                );
            }
            Err(error)
        },
        WaitState::Cancelled { attempt } => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.info(
                    "waiter.cancelled",
                    "Wait for metrics update cancelled",
                    Some(log_fields([
                        ("attempt", attempt.to_string()),
                        ("baseline", baseline.to_string()),
                    ])),
                );
            }
            Err(ErrorEnvelope::cancelled("wait for metrics update cancelled")
                .with_metadata("operation", OPERATION)
                .with_metadata("attempt", attempt.to_string()))
        },
        WaitState::Polling { .. } => Err(ErrorEnvelope::invariant(
            ErrorCode::internal(),
            "wait loop exited while polling",
        )),
    }
}

fn timeout_error(
    attempts: u32,
    elapsed_ms: u64,
    baseline: Baseline,
    policy: &WaitPolicy,
) -> ErrorEnvelope {
    let budget_sec = policy.budget().as_secs_f64();
    ErrorEnvelope::timed_out(format!(
        "metrics file update not received after {attempts} tries in {budget_sec} sec"
    ))
    .with_metadata("operation", OPERATION)
    .with_metadata("attempts", attempts.to_string())
    .with_metadata("elapsedMs", elapsed_ms.to_string())
    .with_metadata("baseline", baseline.to_string())
}
