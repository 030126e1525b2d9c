//! # gc-metrics-domain
//!
//! Domain types and pure logic for validating garbage-collector metric reports:
//!
//! - **Metrics** - `Sample`, `ExpectedKeySet`, the `AccGc*` key names
//! - **Updates** - `VersionMarker`, `Baseline`, `RawUpdate`
//! - **Parser** - `parse_line` for flat `key=value` lines
//! - **Validation** - key presence, per-cycle sanity, cross-cycle progression
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use gc_metrics_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod metrics;
pub mod parser;
pub mod update;
pub mod validation;

pub use metrics::{ExpectedKeySet, GC_EXPECTED_KEYS, GC_METRIC_PREFIX, Sample, keys};
pub use parser::{ParseError, is_metric_token, parse_line};
pub use update::{Baseline, RawUpdate, VersionMarker};
pub use validation::{
    CounterPair, InvariantViolation, PROGRESSION_COUNTERS, check_keys_present, check_progression,
    check_sanity, missing_keys, require_keys_present,
};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
