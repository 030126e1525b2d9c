//! Environment validation helpers.

use gc_metrics_config::{HarnessConfig, HarnessEnv, apply_env_overrides};
use gc_metrics_shared::ErrorEnvelope;
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Validate that the provided env overrides can be parsed and merged into a config.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<()> {
    let parsed = HarnessEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let _ = apply_env_overrides(HarnessConfig::default(), &parsed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_shared::ErrorCode;

    #[test]
    fn accepts_valid_overrides() -> InfraResult<()> {
        let env = BTreeMap::from([
            ("GCM_WAITER_MAX_ATTEMPTS".to_owned(), "4".to_owned()),
            ("GCM_LOG_LEVEL".to_owned(), "debug".to_owned()),
        ]);
        validate_env_parsing(&env)
    }

    #[test]
    fn rejects_values_outside_bounds() {
        let env = BTreeMap::from([("GCM_TAILER_POLL_INTERVAL_MS".to_owned(), "1".to_owned())]);
        let error = validate_env_parsing(&env).err();
        assert!(matches!(
            error,
            Some(error) if error.code == ErrorCode::new("config", "invalid_timeout")
        ));
    }
}
