//! # gc-metrics-adapters
//!
//! Adapter implementations for ports (filesystem, clock, logging).
//! This crate depends on `ports` and `shared`.

pub mod clock;
pub mod fs;
pub mod log_sink;
pub mod logger;

pub use clock::SystemClock;
pub use fs::LocalFileSystem;
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
