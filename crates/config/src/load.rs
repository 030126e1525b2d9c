//! Config loading helpers (env + file).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{HarnessConfig, HarnessEnv, ValidatedHarnessConfig, apply_env_overrides};
use gc_metrics_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the harness config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`HarnessEnv`)
/// - config JSON (file content)
/// - defaults (`HarnessConfig::default()`)
pub fn load_harness_config_from_sources(
    config_json: Option<&str>,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config = match config_json {
        None => HarnessConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the harness config from an optional file path (`.json` or `.toml`).
pub fn load_harness_config_from_path(
    config_path: Option<&Path>,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config = match config_path {
        None => HarnessConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };

    apply_env_overrides(config, env)
}

/// Load the harness config from std env and an optional file path.
pub fn load_harness_config_std_env(
    config_path: Option<&Path>,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let env = HarnessEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_harness_config_from_path(config_path, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &HarnessConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &HarnessConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<HarnessConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_config_json() -> Result<(), Box<dyn std::error::Error>> {
        let config_json = r#"{
          "version": 1,
          "waiter": { "maxAttempts": 5, "delayMs": 250 }
        }"#;
        let env = HarnessEnv {
            waiter_max_attempts: Some(7),
            ..HarnessEnv::default()
        };

        let config = load_harness_config_from_sources(Some(config_json), &env)?;
        assert_eq!(config.waiter.max_attempts, 7);
        assert_eq!(config.waiter.delay_ms, 250);
        Ok(())
    }

    #[test]
    fn invalid_config_value_overridden_by_valid_env_succeeds()
    -> Result<(), Box<dyn std::error::Error>> {
        let config_json = r#"{ "waiter": { "delayMs": 0 } }"#;
        let env = HarnessEnv {
            waiter_delay_ms: Some(100),
            ..HarnessEnv::default()
        };

        let config = load_harness_config_from_sources(Some(config_json), &env)?;
        assert_eq!(config.waiter.delay_ms, 100);
        Ok(())
    }

    #[test]
    fn serialization_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_harness_config_from_sources(None, &HarnessEnv::default())?;
        assert_eq!(to_pretty_json(&config)?, to_pretty_json(&config)?);
        assert!(to_pretty_toml(&config)?.contains("[waiter]"));
        Ok(())
    }

    #[test]
    fn pretty_json_round_trips_through_loader() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_harness_config_from_sources(None, &HarnessEnv::default())?;
        let json = to_pretty_json(&config)?;
        let reloaded = load_harness_config_from_sources(Some(&json), &HarnessEnv::default())?;
        assert_eq!(reloaded.as_ref(), config.as_ref());
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("does/not/exist.toml");
        let error = load_harness_config_from_path(Some(path), &HarnessEnv::default()).err();
        assert!(matches!(
            error,
            Some(error) if error.code == ErrorCode::new("config", "config_file_not_found")
                && error.metadata_value("path").is_some()
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let error = detect_config_format(Path::new("harness.yaml")).err();
        assert!(matches!(
            error,
            Some(error) if error.metadata_value("extension") == Some("yaml")
        ));
        assert_eq!(
            detect_config_format(Path::new("harness.TOML"))?,
            ConfigFormat::Toml
        );
        Ok(())
    }
}
