//! In-memory adapter implementations for port contracts.
//!
//! These implementations are intended for:
//! - Unit/integration tests
//! - Deterministic waiter and tailer tests driven by a manual clock

use gc_metrics_domain::{RawUpdate, VersionMarker};
use gc_metrics_ports::{
    BoxFuture, ClockPort, FileSystemPort, LogEvent, LogFields, LogLevel, LoggerPort,
    UpdateSourcePort,
};
use gc_metrics_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// Logger capturing events (with merged child fields) for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base_fields: LogFields,
}

impl RecordingLogger {
    /// Snapshot of captured events.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of captured events, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event.to_string())
            .collect()
    }

    /// First captured event with the given name.
    pub fn find(&self, name: &str) -> Option<LogEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|event| &*event.event == name)
            .cloned()
    }

    /// Number of captured events at `level`.
    pub fn count_at(&self, level: LogLevel) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base_fields.is_empty() {
            let mut fields = self.base_fields.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        self.events.lock().unwrap().push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base_fields,
        })
    }
}

/// In-memory filesystem keyed by path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
    unreadable: Arc<RwLock<HashSet<PathBuf>>>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryFileSystem {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full content of a file.
    pub async fn write_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.write().await.insert(path.into(), contents.into());
    }

    /// Append one line (with trailing newline) to a file, creating it if missing.
    pub async fn append_line(&self, path: impl Into<PathBuf>, line: &str) {
        let mut files = self.files.write().await;
        let contents = files.entry(path.into()).or_default();
        contents.push_str(line);
        contents.push('\n');
    }

    /// Remove a file.
    pub async fn remove_file(&self, path: &Path) {
        self.files.write().await.remove(path);
    }

    /// Make reads of `path` fail (or succeed again) with an I/O error.
    pub async fn set_unreadable(&self, path: impl Into<PathBuf>, unreadable: bool) {
        let path = path.into();
        let mut set = self.unreadable.write().await;
        if unreadable {
            set.insert(path);
        } else {
            set.remove(&path);
        }
    }

    /// Number of `read_file_text` calls served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileSystemPort for InMemoryFileSystem {
    fn read_file_text(
        &self,
        ctx: &RequestContext,
        path: PathBuf,
    ) -> BoxFuture<'_, Result<Option<Box<str>>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("fs.read_file_text")?;
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.unreadable.read().await.contains(&path) {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::permission_denied(),
                    "file is unreadable",
                )
                .with_metadata("path", path.to_string_lossy().to_string()));
            }
            Ok(self
                .files
                .read()
                .await
                .get(&path)
                .map(|contents| contents.clone().into_boxed_str()))
        })
    }
}

/// Manually driven clock.
///
/// `sleep` advances the clock by the requested duration, records it, and
/// yields once so other tasks on the runtime make progress.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub fn starting_at(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.now_ms.store(start_ms, Ordering::SeqCst);
        clock
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now_ms
            .fetch_add(duration_ms(duration), Ordering::SeqCst);
    }

    /// Sleeps requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Total time slept.
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl ClockPort for ManualClock {
    fn now_epoch_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, ctx: &RequestContext, duration: Duration) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("clock.sleep")?;
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
            tokio::task::yield_now().await;
            ctx.ensure_not_cancelled("clock.sleep")
        })
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Update source replaying a fixed script, one entry per `latest()` call.
///
/// Once the script is exhausted the last entry repeats.
#[derive(Debug, Clone)]
pub struct ScriptedUpdateSource {
    script: Arc<Vec<RawUpdate>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedUpdateSource {
    /// Replay `script`.
    pub fn new(script: Vec<RawUpdate>) -> Self {
        Self {
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that never publishes.
    pub fn never() -> Self {
        Self::new(vec![RawUpdate::empty()])
    }

    /// Publish `lines` in order, each held for `polls_per_line` reads.
    pub fn lines<I, S>(lines: I, polls_per_line: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        let mut script = Vec::new();
        let mut version = VersionMarker::NONE;
        for line in lines {
            version = version.next();
            let update = RawUpdate::new(version, line, version.get());
            script.extend(std::iter::repeat_n(update, polls_per_line.max(1)));
        }
        Self::new(script)
    }

    /// Number of `latest()` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UpdateSourcePort for ScriptedUpdateSource {
    fn latest(&self) -> RawUpdate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(RawUpdate::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_ports::log_fields;

    #[tokio::test]
    async fn in_memory_fs_reads_missing_as_none() {
        let fs = InMemoryFileSystem::new();
        let ctx = RequestContext::new_run();
        let path = PathBuf::from("gc.metrics.log");

        assert!(fs.read_file_text(&ctx, path.clone()).await.unwrap().is_none());
        fs.append_line(&path, "AccGcStarted=1").await;
        fs.append_line(&path, "AccGcStarted=2").await;

        let contents = fs.read_file_text(&ctx, path.clone()).await.unwrap();
        assert_eq!(contents.as_deref(), Some("AccGcStarted=1\nAccGcStarted=2\n"));

        fs.set_unreadable(&path, true).await;
        assert!(fs.read_file_text(&ctx, path).await.is_err());
        assert_eq!(fs.read_count(), 3);
    }

    #[tokio::test]
    async fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::starting_at(1_000);
        let ctx = RequestContext::new_run();

        clock.sleep(&ctx, Duration::from_millis(250)).await.unwrap();
        clock.sleep(&ctx, Duration::from_millis(250)).await.unwrap();

        assert_eq!(clock.now_epoch_ms(), 1_500);
        assert_eq!(clock.total_slept(), Duration::from_millis(500));

        ctx.cancel();
        let error = clock.sleep(&ctx, Duration::from_millis(1)).await.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn scripted_source_repeats_last_entry() {
        let source = ScriptedUpdateSource::lines(["a=1", "a=2"], 2);
        let versions: Vec<u64> = (0..6).map(|_| source.latest_version().get()).collect();

        assert_eq!(versions, vec![1, 1, 2, 2, 2, 2]);
        assert_eq!(source.calls(), 6);
        assert!(!ScriptedUpdateSource::never().latest().has_line());
    }

    #[test]
    fn recording_logger_merges_child_fields() {
        let logger = RecordingLogger::default();
        let child = logger.child(log_fields([("correlationId", "run_1")]));
        child.info("scenario.gcCycles.start", "start", Some(log_fields([("step", 1)])));

        let event = logger.find("scenario.gcCycles.start").unwrap();
        let fields = event.fields.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(logger.count_at(LogLevel::Info), 1);
        assert_eq!(logger.event_names(), vec!["scenario.gcCycles.start"]);
    }
}
