//! Two-cycle garbage-collector metrics check.

use crate::wait_for_update::{WaitForUpdateDeps, WaitForUpdateInput, WaitPolicy, wait_for_update};
use gc_metrics_domain::{
    Baseline, ExpectedKeySet, GC_METRIC_PREFIX, RawUpdate, Sample, check_progression,
    check_sanity, parse_line, require_keys_present,
};
use gc_metrics_ports::{ClockPort, LogFields, LoggerPort, UpdateSourcePort, log_fields};
use gc_metrics_shared::{ErrorEnvelope, RequestContext, Result, ResultExt};
use serde_json::Value;
use std::sync::Arc;

/// Dependencies for the scenario.
#[derive(Clone)]
pub struct GcCycleCheckDeps {
    /// Published updates (usually a tailer handle).
    pub source: Arc<dyn UpdateSourcePort>,
    /// Clock for the test start and the waits.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

impl GcCycleCheckDeps {
    fn waiter(&self) -> WaitForUpdateDeps {
        WaitForUpdateDeps {
            source: Arc::clone(&self.source),
            clock: Arc::clone(&self.clock),
            logger: self.logger.clone(),
        }
    }
}

/// Scenario settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcCycleCheckInput {
    /// Policy applied to every wait.
    pub policy: WaitPolicy,
    /// Metric family prefix.
    pub prefix: Box<str>,
    /// Keys each observed sample must carry.
    pub expected_keys: ExpectedKeySet,
    /// Discard the first observed line as possibly stale.
    pub skip_stale_first: bool,
}

impl Default for GcCycleCheckInput {
    fn default() -> Self {
        Self {
            policy: WaitPolicy::default(),
            prefix: GC_METRIC_PREFIX.into(),
            expected_keys: ExpectedKeySet::gc_default(),
            skip_stale_first: true,
        }
    }
}

/// One validated cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleObservation {
    /// Update the sample was parsed from.
    pub update: RawUpdate,
    /// Parsed counters.
    pub sample: Sample,
}

/// Outcome of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcCycleReport {
    /// Clock reading when the scenario started (ms).
    pub test_start_ms: u64,
    /// Update discarded as stale, when skipping was enabled.
    pub skipped: Option<RawUpdate>,
    /// First validated cycle.
    pub first: CycleObservation,
    /// Following validated cycle.
    pub next: CycleObservation,
}

/// Observe two successive metric reports and validate them.
///
/// Each sample must carry every expected key and pass the sanity checks
/// against the test start; the second must show strict progression over the
/// first.
pub async fn validate_gc_cycles(
    ctx: &RequestContext,
    deps: &GcCycleCheckDeps,
    input: GcCycleCheckInput,
) -> Result<GcCycleReport> {
    let test_start_ms = deps.clock.now_epoch_ms();
    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "scenario.gcCycles.start",
            "GC cycle check started",
            Some(log_fields_start(&input, test_start_ms)),
        );
    }

    let result = run_cycles(ctx, deps, &input, test_start_ms).await;
    let duration_ms = deps.clock.now_epoch_ms().saturating_sub(test_start_ms);

    match result {
        Ok(report) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.info(
                    "scenario.gcCycles.completed",
                    "GC cycle check completed",
                    Some(log_fields([
                        ("durationMs", Value::from(duration_ms)),
                        ("firstVersion", Value::from(report.first.update.version.get())),
                        ("nextVersion", Value::from(report.next.update.version.get())),
                    ])),
                );
            }
            Ok(report)
        },
        Err(error) => {
            if let Some(logger) = deps.logger.as_ref() {
                if error.is_cancelled() {
                    logger.info(
                        "scenario.gcCycles.aborted",
                        "GC cycle check aborted",
                        Some(log_fields([("durationMs", duration_ms)])),
                    );
                } else {
                    logger.error(
                        "scenario.gcCycles.failed",
                        "GC cycle check failed",
                        Some(log_fields_error(duration_ms, &error)),
                    );
                }
            }
            Err(error)
        },
    }
}

async fn run_cycles(
    ctx: &RequestContext,
    deps: &GcCycleCheckDeps,
    input: &GcCycleCheckInput,
    test_start_ms: u64,
) -> Result<GcCycleReport> {
    let waiter = deps.waiter();
    let mut baseline = Baseline::None;

    let skipped = if input.skip_stale_first {
        let stale = wait_for_update(ctx, &waiter, wait_input(baseline, input))
            .await
            .with_error_metadata("cycle", "stale")?;
        baseline = Baseline::after(&stale);
        Some(stale)
    } else {
        None
    };

    let first = observe_cycle(ctx, &waiter, baseline, input, test_start_ms, "first").await?;
    let next = observe_cycle(
        ctx,
        &waiter,
        Baseline::after(&first.update),
        input,
        test_start_ms,
        "next",
    )
    .await?;

    check_progression(&first.sample, &next.sample)
        .map_err(ErrorEnvelope::from)
        .with_error_metadata("cycle", "next")?;

    Ok(GcCycleReport {
        test_start_ms,
        skipped,
        first,
        next,
    })
}

async fn observe_cycle(
    ctx: &RequestContext,
    waiter: &WaitForUpdateDeps,
    baseline: Baseline,
    input: &GcCycleCheckInput,
    test_start_ms: u64,
    cycle: &'static str,
) -> Result<CycleObservation> {
    let update = wait_for_update(ctx, waiter, wait_input(baseline, input))
        .await
        .with_error_metadata("cycle", cycle)?;

    let sample = parse_line(update.line(), &input.prefix)
        .map_err(ErrorEnvelope::from)
        .and_then(|sample| {
            require_keys_present(&sample, &input.expected_keys)?;
            check_sanity(&sample, test_start_ms)?;
            Ok(sample)
        })
        .with_error_metadata("cycle", cycle)
        .with_error_metadata("version", update.version.to_string())?;

    Ok(CycleObservation { update, sample })
}

const fn wait_input(baseline: Baseline, input: &GcCycleCheckInput) -> WaitForUpdateInput {
    WaitForUpdateInput {
        baseline,
        policy: input.policy,
    }
}

fn log_fields_start(input: &GcCycleCheckInput, test_start_ms: u64) -> LogFields {
    log_fields([
        ("testStartMs", Value::from(test_start_ms)),
        ("prefix", Value::from(&*input.prefix)),
        ("expectedKeys", Value::from(input.expected_keys.len())),
        ("maxAttempts", Value::from(input.policy.max_attempts())),
        (
            "delayMs",
            Value::from(u64::try_from(input.policy.delay().as_millis()).unwrap_or(u64::MAX)),
        ),
        ("skipStaleFirst", Value::from(input.skip_stale_first)),
    ])
}

fn log_fields_error(duration_ms: u64, error: &ErrorEnvelope) -> LogFields {
    let mut fields = log_fields([
        ("durationMs", Value::from(duration_ms)),
        ("errorCode", Value::from(error.code.to_string())),
        ("error", Value::from(error.to_string())),
    ]);
    if let Some(cycle) = error.metadata_value("cycle") {
        fields.insert("cycle".into(), Value::from(cycle));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_domain::{VersionMarker, keys};
    use gc_metrics_ports::LogLevel;
    use gc_metrics_shared::ErrorCode;
    use gc_metrics_testkit::{
        GcCounters, ManualClock, RecordingLogger, ScriptedUpdateSource, gc_metrics_line,
    };
    use std::time::Duration;

    fn deps(
        source: &ScriptedUpdateSource,
        clock: &ManualClock,
        logger: &RecordingLogger,
    ) -> GcCycleCheckDeps {
        GcCycleCheckDeps {
            source: Arc::new(source.clone()),
            clock: Arc::new(clock.clone()),
            logger: Some(Arc::new(logger.clone())),
        }
    }

    fn input(skip_stale_first: bool) -> GcCycleCheckInput {
        GcCycleCheckInput {
            policy: WaitPolicy::new(5, Duration::from_millis(10)),
            skip_stale_first,
            ..GcCycleCheckInput::default()
        }
    }

    #[tokio::test]
    async fn two_progressing_cycles_pass() -> Result<()> {
        let source = ScriptedUpdateSource::lines(
            [gc_metrics_line(110, 120, 1), gc_metrics_line(200, 250, 2)],
            2,
        );
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let report = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(false)).await?;

        assert_eq!(report.test_start_ms, 100);
        assert!(report.skipped.is_none());
        assert_eq!(report.first.update.version, VersionMarker::new(1));
        assert_eq!(report.next.update.version, VersionMarker::new(2));
        assert_eq!(report.next.sample.get(keys::RUN_CYCLE_COUNT), Some(2));
        assert!(logger.find("scenario.gcCycles.completed").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn stale_first_line_is_discarded() -> Result<()> {
        let source = ScriptedUpdateSource::lines(
            [
                gc_metrics_line(10, 20, 7),
                gc_metrics_line(110, 120, 8),
                gc_metrics_line(130, 140, 9),
            ],
            1,
        );
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let report = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(true)).await?;

        assert_eq!(
            report.skipped.map(|update| update.version),
            Some(VersionMarker::new(1))
        );
        assert_eq!(report.first.sample.get(keys::STARTED), Some(110));
        assert_eq!(report.next.sample.get(keys::STARTED), Some(130));
        Ok(())
    }

    #[tokio::test]
    async fn stalled_run_cycle_count_fails_progression() {
        let source = ScriptedUpdateSource::lines(
            [gc_metrics_line(110, 120, 1), gc_metrics_line(200, 250, 1)],
            1,
        );
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let error = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(false))
            .await
            .err();

        assert!(matches!(
            error,
            Some(error) if error.code == ErrorCode::new("metrics", "invariant_violation")
                && error.metadata_value("counter") == Some(keys::RUN_CYCLE_COUNT)
                && error.metadata_value("cycle") == Some("next")
        ));
        assert!(logger.find("scenario.gcCycles.failed").is_some());
        assert_eq!(logger.count_at(LogLevel::Error), 1);
    }

    #[tokio::test]
    async fn cycle_started_before_test_fails_sanity() {
        let counters = GcCounters {
            wal_started: 50,
            ..GcCounters::new(110, 120, 1)
        };
        let source = ScriptedUpdateSource::lines([counters.to_line()], 1);
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let error = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(false))
            .await
            .err();

        assert!(matches!(
            error,
            Some(error) if error.metadata_value("pair") == Some("wal")
                && error.metadata_value("cycle") == Some("first")
        ));
    }

    #[tokio::test]
    async fn missing_keys_fail_the_first_cycle() {
        let source = ScriptedUpdateSource::lines(["AccGcStarted=110, AccGcFinished=120"], 1);
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let error = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(false))
            .await
            .err();

        assert!(matches!(
            error,
            Some(error) if error.metadata_value("violation") == Some("missing_keys")
                && error.metadata_value("version") == Some("v1")
        ));
    }

    #[tokio::test]
    async fn no_second_update_times_out() {
        let source = ScriptedUpdateSource::lines([gc_metrics_line(110, 120, 1)], 1);
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();

        let error = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(false))
            .await
            .err();

        assert!(matches!(
            error,
            Some(error) if error.is_timeout() && error.metadata_value("cycle") == Some("next")
        ));
        assert_eq!(clock.total_slept(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let source = ScriptedUpdateSource::never();
        let clock = ManualClock::starting_at(100);
        let logger = RecordingLogger::default();
        let ctx = RequestContext::new_run();
        ctx.cancel();

        let error = validate_gc_cycles(&ctx, &deps(&source, &clock, &logger), input(true))
            .await
            .err();

        assert!(matches!(error, Some(error) if error.is_cancelled()));
        assert!(logger.find("scenario.gcCycles.aborted").is_some());
        assert!(logger.find("scenario.gcCycles.failed").is_none());
    }
}
