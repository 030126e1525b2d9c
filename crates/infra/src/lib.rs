//! # gc-metrics-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Config loading helpers.
pub mod config_check;
/// Environment validation helpers.
pub mod env_check;
/// Harness composition.
pub mod harness;

pub use config_check::load_effective_config_json;
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use harness::{
    HarnessRuntime, build_logger, build_logger_with_sink, gc_cycle_check_input, log_level,
    run_gc_cycle_check, run_gc_cycle_check_with, start_tailing, start_tailing_with,
};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
