//! Harness composition: adapters from config, tailing, and the cycle check.

use crate::InfraResult;
use gc_metrics_adapters::{JsonLogger, LocalFileSystem, LogSink, StderrLogSink, SystemClock};
use gc_metrics_app::{
    FileTailer, FileTailerDeps, FileTailerOptions, GcCycleCheckDeps, GcCycleCheckInput,
    GcCycleReport, WaitPolicy, validate_gc_cycles,
};
use gc_metrics_config::{LogLevelSetting, ValidatedHarnessConfig};
use gc_metrics_ports::{ClockPort, FileSystemPort, LogLevel, LoggerPort, log_fields};
use gc_metrics_shared::RequestContext;
use std::sync::Arc;

/// Adapters the harness runs on.
#[derive(Clone)]
pub struct HarnessRuntime {
    /// Filesystem used by the tailer.
    pub fs: Arc<dyn FileSystemPort>,
    /// Clock used by the tailer and the waits.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

impl HarnessRuntime {
    /// Local filesystem, system clock, and a stderr JSON logger.
    #[must_use]
    pub fn local(config: &ValidatedHarnessConfig) -> Self {
        Self {
            fs: Arc::new(LocalFileSystem::default()),
            clock: Arc::new(SystemClock::new()),
            logger: Some(build_logger(config)),
        }
    }

    /// Replace the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Option<Arc<dyn LoggerPort>>) -> Self {
        self.logger = logger;
        self
    }
}

/// Map the configured level onto the logger level.
#[must_use]
pub const fn log_level(setting: LogLevelSetting) -> LogLevel {
    match setting {
        LogLevelSetting::Debug => LogLevel::Debug,
        LogLevelSetting::Info => LogLevel::Info,
        LogLevelSetting::Warn => LogLevel::Warn,
        LogLevelSetting::Error => LogLevel::Error,
    }
}

/// JSON logger on stderr at the configured level.
#[must_use]
pub fn build_logger(config: &ValidatedHarnessConfig) -> Arc<dyn LoggerPort> {
    build_logger_with_sink(config, Arc::new(StderrLogSink))
}

/// JSON logger on `sink` at the configured level.
#[must_use]
pub fn build_logger_with_sink(
    config: &ValidatedHarnessConfig,
    sink: Arc<dyn LogSink>,
) -> Arc<dyn LoggerPort> {
    Arc::new(JsonLogger::new(sink).with_min_level(log_level(config.logging.level)))
}

/// Scenario settings derived from the config.
#[must_use]
pub fn gc_cycle_check_input(config: &ValidatedHarnessConfig) -> GcCycleCheckInput {
    GcCycleCheckInput {
        policy: WaitPolicy::new(config.waiter.max_attempts, config.limits().waiter_delay()),
        prefix: config.metrics.prefix.clone(),
        expected_keys: config.expected_key_set(),
        skip_stale_first: config.metrics.skip_stale_first,
    }
}

/// Start tailing the configured sink with local adapters.
#[must_use]
pub fn start_tailing(ctx: &RequestContext, config: &ValidatedHarnessConfig) -> FileTailer {
    start_tailing_with(ctx, config, &HarnessRuntime::local(config))
}

/// Start tailing the configured sink on `runtime`.
#[must_use]
pub fn start_tailing_with(
    ctx: &RequestContext,
    config: &ValidatedHarnessConfig,
    runtime: &HarnessRuntime,
) -> FileTailer {
    FileTailer::spawn(
        ctx,
        FileTailerDeps {
            fs: Arc::clone(&runtime.fs),
            clock: Arc::clone(&runtime.clock),
            logger: runtime.logger.clone(),
        },
        FileTailerOptions {
            path: config.sink_path(),
            poll_interval: config.limits().poll_interval(),
        },
    )
}

/// Tail the configured sink and validate two GC cycles with local adapters.
pub async fn run_gc_cycle_check(
    ctx: &RequestContext,
    config: &ValidatedHarnessConfig,
) -> InfraResult<GcCycleReport> {
    run_gc_cycle_check_with(ctx, config, HarnessRuntime::local(config)).await
}

/// Tail the configured sink and validate two GC cycles on `runtime`.
///
/// The tailer is stopped whatever the outcome.
pub async fn run_gc_cycle_check_with(
    ctx: &RequestContext,
    config: &ValidatedHarnessConfig,
    runtime: HarnessRuntime,
) -> InfraResult<GcCycleReport> {
    let logger = runtime.logger.as_ref().map(|logger| {
        Arc::<dyn LoggerPort>::from(logger.child(log_fields([
            ("correlationId", ctx.correlation_id().as_str()),
            ("sinkFile", &*config.tailer.sink_file),
        ])))
    });
    let runtime = runtime.with_logger(logger);

    let tailer = start_tailing_with(ctx, config, &runtime);
    let deps = GcCycleCheckDeps {
        source: Arc::new(tailer.handle()),
        clock: Arc::clone(&runtime.clock),
        logger: runtime.logger.clone(),
    };

    let report = validate_gc_cycles(ctx, &deps, gc_cycle_check_input(config)).await;
    let stopped = tailer.stop().await;
    let report = report?;
    stopped?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_adapters::MemoryLogSink;
    use gc_metrics_config::{HarnessConfig, HarnessEnv, apply_env_overrides};
    use std::time::Duration;

    fn config_with(env: HarnessEnv) -> InfraResult<ValidatedHarnessConfig> {
        apply_env_overrides(HarnessConfig::default(), &env)
    }

    #[test]
    fn cycle_input_follows_config() -> InfraResult<()> {
        let config = config_with(HarnessEnv {
            waiter_max_attempts: Some(3),
            waiter_delay_ms: Some(250),
            skip_stale_first: Some(false),
            ..HarnessEnv::default()
        })?;

        let input = gc_cycle_check_input(&config);
        assert_eq!(input.policy, WaitPolicy::new(3, Duration::from_millis(250)));
        assert_eq!(&*input.prefix, "AccGc");
        assert_eq!(input.expected_keys.len(), 14);
        assert!(!input.skip_stale_first);
        Ok(())
    }

    #[test]
    fn logger_honours_configured_level() -> InfraResult<()> {
        let config = config_with(HarnessEnv {
            log_level: Some(LogLevelSetting::Warn),
            ..HarnessEnv::default()
        })?;
        let sink = Arc::new(MemoryLogSink::default());
        let logger = build_logger_with_sink(&config, sink.clone());

        logger.info("scenario.gcCycles.start", "dropped", None);
        logger.error("scenario.gcCycles.failed", "kept", None);
        assert_eq!(sink.len(), 1);
        Ok(())
    }

    #[test]
    fn levels_map_one_to_one() {
        assert_eq!(log_level(LogLevelSetting::Debug), LogLevel::Debug);
        assert_eq!(log_level(LogLevelSetting::Error), LogLevel::Error);
    }
}
