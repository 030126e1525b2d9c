//! Tailer + waiter + validator, end to end.

use gc_metrics_adapters::{LocalFileSystem, SystemClock};
use gc_metrics_app::{
    FileTailer, FileTailerDeps, FileTailerOptions, GcCycleCheckDeps, GcCycleCheckInput,
    WaitForUpdateDeps, WaitForUpdateInput, WaitPolicy, validate_gc_cycles, wait_for_update,
};
use gc_metrics_domain::{
    Baseline, ExpectedKeySet, GC_METRIC_PREFIX, check_keys_present, check_progression,
    check_sanity, parse_line,
};
use gc_metrics_ports::{ClockPort, FileSystemPort};
use gc_metrics_shared::{RequestContext, Result};
use gc_metrics_testkit::{InMemoryFileSystem, ManualClock, RecordingLogger, gc_metrics_line};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn spawn(
    ctx: &RequestContext,
    fs: Arc<dyn FileSystemPort>,
    clock: Arc<dyn ClockPort>,
    path: PathBuf,
    poll_interval: Duration,
) -> FileTailer {
    FileTailer::spawn(
        ctx,
        FileTailerDeps {
            fs,
            clock,
            logger: None,
        },
        FileTailerOptions {
            path,
            poll_interval,
        },
    )
}

/// Replace `path` atomically through a staging file.
async fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, contents).await?;
    tokio::fs::rename(&staging, path).await
}

#[tokio::test]
async fn successive_lines_are_observed_in_order() -> Result<()> {
    let ctx = RequestContext::new_run();
    let fs = InMemoryFileSystem::new();
    let clock = ManualClock::starting_at(100);
    let path = PathBuf::from("gc.metrics.log");
    let tailer = spawn(
        &ctx,
        Arc::new(fs.clone()),
        Arc::new(clock.clone()),
        path.clone(),
        Duration::from_millis(5),
    );

    let waiter = WaitForUpdateDeps {
        source: Arc::new(tailer.handle()),
        clock: Arc::new(clock.clone()),
        logger: None,
    };
    let policy = WaitPolicy::new(50, Duration::from_millis(5));

    fs.append_line(&path, &gc_metrics_line(110, 120, 1)).await;
    let first = wait_for_update(
        &ctx,
        &waiter,
        WaitForUpdateInput {
            baseline: Baseline::None,
            policy,
        },
    )
    .await?;

    fs.append_line(&path, &gc_metrics_line(200, 250, 2)).await;
    let next = wait_for_update(
        &ctx,
        &waiter,
        WaitForUpdateInput {
            baseline: Baseline::after(&first),
            policy,
        },
    )
    .await?;

    assert!(next.version > first.version);
    let first_sample = parse_line(first.line(), GC_METRIC_PREFIX)?;
    let next_sample = parse_line(next.line(), GC_METRIC_PREFIX)?;
    assert!(check_keys_present(&first_sample, &ExpectedKeySet::gc_default()));
    check_sanity(&first_sample, 100)?;
    check_sanity(&next_sample, 100)?;
    check_progression(&first_sample, &next_sample)?;

    tailer.stop().await
}

#[tokio::test]
async fn scenario_runs_against_a_real_file() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("gc-metrics-app-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join("gc.metrics.log");
    tokio::fs::write(&path, format!("{}\n", gc_metrics_line(1, 2, 40))).await?;

    let ctx = RequestContext::new_run();
    let clock = Arc::new(SystemClock::new());
    let tailer = spawn(
        &ctx,
        Arc::new(LocalFileSystem::default()),
        clock.clone(),
        path.clone(),
        Duration::from_millis(5),
    );
    let logger = RecordingLogger::default();
    let deps = GcCycleCheckDeps {
        source: Arc::new(tailer.handle()),
        clock: clock.clone(),
        logger: Some(Arc::new(logger.clone())),
    };

    let writer = {
        let path = path.clone();
        let clock = clock.clone();
        tokio::spawn(async move {
            // Wait for the stale line to be seen, then emit two fresh cycles.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let started = i64::try_from(clock.now_epoch_ms()).unwrap_or(i64::MAX);
            let mut contents = tokio::fs::read_to_string(&path).await?;
            contents.push_str(&gc_metrics_line(started, started + 5, 41));
            contents.push('\n');
            replace_file(&path, &contents).await?;

            tokio::time::sleep(Duration::from_millis(50)).await;
            contents.push_str(&gc_metrics_line(started + 10, started + 15, 42));
            contents.push('\n');
            replace_file(&path, &contents).await?;
            Ok::<(), std::io::Error>(())
        })
    };

    let input = GcCycleCheckInput {
        policy: WaitPolicy::new(400, Duration::from_millis(5)),
        ..GcCycleCheckInput::default()
    };
    let report = validate_gc_cycles(&ctx, &deps, input).await;
    let _ = writer.await;
    tailer.stop().await?;
    tokio::fs::remove_dir_all(&dir).await?;

    let report = report?;
    assert!(report.skipped.is_some());
    assert!(report.next.update.version > report.first.update.version);
    assert!(logger.find("scenario.gcCycles.completed").is_some());
    Ok(())
}
