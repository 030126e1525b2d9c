//! # gc-metrics-config
//!
//! Configuration schema, validation, and normalization logic for the harness.
//! This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;
/// JSON Schema export.
pub mod schema_export;

pub use schema::{
    CURRENT_CONFIG_VERSION, ConfigSchemaError, DEFAULT_SINK_FILE, EXPECTED_KEYS_MAX,
    HarnessConfig, HarnessLimits, LogLevelSetting, LoggingConfig, MetricsConfig, TailerConfig,
    ValidatedHarnessConfig, WaiterConfig, parse_harness_config_json, parse_harness_config_toml,
};

pub use env::{EnvParseError, HARNESS_ENV_VARS, HarnessEnv, apply_env_overrides};
pub use load::{
    load_harness_config_from_path, load_harness_config_from_sources, load_harness_config_std_env,
    to_pretty_json, to_pretty_toml,
};
pub use schema_export::harness_config_schema;

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_domain::domain_crate_version;
    use gc_metrics_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        let domain_version = domain_crate_version();
        let shared_version = shared_crate_version();

        assert!(!domain_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
