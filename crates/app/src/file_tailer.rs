//! Background tailer publishing the last line of the metrics sink.
//!
//! One task polls the file and owns the only `watch::Sender`; every
//! `FileTailerHandle` reads the latest `RawUpdate` as a single snapshot.

use gc_metrics_domain::{RawUpdate, VersionMarker};
use gc_metrics_ports::{ClockPort, FileSystemPort, LoggerPort, UpdateSourcePort, log_fields};
use gc_metrics_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Dependencies for the tailer task.
#[derive(Clone)]
pub struct FileTailerDeps {
    /// Filesystem used to read the sink.
    pub fs: Arc<dyn FileSystemPort>,
    /// Clock used for the poll interval and publish timestamps.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// What to tail and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTailerOptions {
    /// Metrics sink file.
    pub path: PathBuf,
    /// Delay between two reads.
    pub poll_interval: Duration,
}

/// Running tailer. Dropping it cancels the background task.
pub struct FileTailer {
    ctx: RequestContext,
    handle: FileTailerHandle,
    task: Option<JoinHandle<()>>,
}

impl FileTailer {
    /// Start tailing `options.path` on the current tokio runtime.
    ///
    /// The task stops when `ctx` (or the tailer itself) is cancelled.
    #[must_use]
    pub fn spawn(ctx: &RequestContext, deps: FileTailerDeps, options: FileTailerOptions) -> Self {
        let ctx = ctx.child();
        let (sender, receiver) = watch::channel(RawUpdate::empty());
        let task = tokio::spawn(run_tailer(ctx.clone(), deps, options, sender));
        Self {
            ctx,
            handle: FileTailerHandle { receiver },
            task: Some(task),
        }
    }

    /// Read-side handle (cheap to clone).
    #[must_use]
    pub fn handle(&self) -> FileTailerHandle {
        self.handle.clone()
    }

    /// Returns true once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the loop and wait for the task to exit.
    pub async fn stop(mut self) -> Result<()> {
        self.ctx.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await.map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("tailer task failed: {error}"),
                ErrorClass::NonRetriable,
            )
        })
    }
}

impl UpdateSourcePort for FileTailer {
    fn latest(&self) -> RawUpdate {
        self.handle.latest()
    }
}

impl Drop for FileTailer {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// Consumer view of a tailer's published state.
#[derive(Debug, Clone)]
pub struct FileTailerHandle {
    receiver: watch::Receiver<RawUpdate>,
}

impl UpdateSourcePort for FileTailerHandle {
    fn latest(&self) -> RawUpdate {
        self.receiver.borrow().clone()
    }
}

async fn run_tailer(
    ctx: RequestContext,
    deps: FileTailerDeps,
    options: FileTailerOptions,
    sender: watch::Sender<RawUpdate>,
) {
    let path_field = options.path.to_string_lossy().to_string();
    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "tailer.started",
            "Metrics tailer started",
            Some(log_fields([
                ("path", Value::from(path_field.as_str())),
                (
                    "pollIntervalMs",
                    Value::from(u64::try_from(options.poll_interval.as_millis()).unwrap_or(u64::MAX)),
                ),
            ])),
        );
    }

    while !ctx.is_cancelled() {
        match deps.fs.read_file_text(&ctx, options.path.clone()).await {
            Ok(Some(contents)) => {
                if let Some(line) = last_non_empty_line(&contents) {
                    publish_if_changed(&sender, line, &deps);
                }
            },
            Ok(None) => {},
            Err(error) if error.is_cancelled() => break,
            Err(error) => {
                if let Some(logger) = deps.logger.as_ref() {
                    logger.debug(
                        "tailer.read_failed",
                        "Metrics sink not readable yet",
                        Some(log_fields([
                            ("path", path_field.clone()),
                            ("error", error.to_string()),
                        ])),
                    );
                }
            },
        }

        if deps.clock.sleep(&ctx, options.poll_interval).await.is_err() {
            break;
        }
    }

    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "tailer.stopped",
            "Metrics tailer stopped",
            Some(log_fields([
                ("path", Value::from(path_field)),
                ("version", Value::from(sender.borrow().version.get())),
            ])),
        );
    }
}

fn publish_if_changed(sender: &watch::Sender<RawUpdate>, line: &str, deps: &FileTailerDeps) {
    let current: VersionMarker = {
        let published = sender.borrow();
        if published.line() == Some(line) {
            return;
        }
        published.version
    };

    let version = current.next();
    sender.send_replace(RawUpdate::new(version, line, deps.clock.now_epoch_ms()));

    if let Some(logger) = deps.logger.as_ref() {
        logger.debug(
            "tailer.published",
            "Metrics line published",
            Some(log_fields([
                ("version", version.get()),
                ("lineLength", u64::try_from(line.len()).unwrap_or(u64::MAX)),
            ])),
        );
    }
}

/// Last newline-terminated line of `contents` that is non-empty once trailing
/// whitespace is removed. An unterminated tail is a record still being written.
pub fn last_non_empty_line(contents: &str) -> Option<&str> {
    let (terminated, _partial) = contents.rsplit_once('\n')?;
    terminated
        .lines()
        .map(str::trim_end)
        .rfind(|line| !line.is_empty())
}
