//! Metric line builders matching what the garbage collector writes.

use gc_metrics_domain::keys;

/// Counter values rendered into a metrics line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcCounters {
    /// Primary cycle start timestamp (ms).
    pub started: i64,
    /// Primary cycle finish timestamp (ms).
    pub finished: i64,
    /// WAL cycle start timestamp (ms).
    pub wal_started: i64,
    /// WAL cycle finish timestamp (ms).
    pub wal_finished: i64,
    /// Completed cycles.
    pub run_cycle_count: i64,
}

impl GcCounters {
    /// Counters where the WAL pair mirrors the primary pair.
    pub fn new(started: i64, finished: i64, run_cycle_count: i64) -> Self {
        Self {
            started,
            finished,
            wal_started: started,
            wal_finished: finished,
            run_cycle_count,
        }
    }

    /// Render the full fourteen-key line, with a foreign token mixed in.
    pub fn to_line(&self) -> String {
        let tokens = [
            (keys::CANDIDATES, 12),
            (keys::DELETED, 4),
            (keys::ERRORS, 0),
            (keys::FINISHED, self.finished),
            (keys::IN_USE, 8),
            (keys::POST_OP_DURATION, 17),
            (keys::RUN_CYCLE_COUNT, self.run_cycle_count),
            (keys::STARTED, self.started),
            (keys::WAL_CANDIDATES, 3),
            (keys::WAL_DELETED, 1),
            (keys::WAL_ERRORS, 0),
            (keys::WAL_FINISHED, self.wal_finished),
            (keys::WAL_IN_USE, 2),
            (keys::WAL_STARTED, self.wal_started),
        ];
        let mut line = String::from("TabletServerUptime=99");
        for (key, value) in tokens {
            line.push_str(", ");
            line.push_str(key);
            line.push('=');
            line.push_str(&value.to_string());
        }
        line
    }
}

/// Shorthand for `GcCounters::new(..).to_line()`.
pub fn gc_metrics_line(started: i64, finished: i64, run_cycle_count: i64) -> String {
    GcCounters::new(started, finished, run_cycle_count).to_line()
}
