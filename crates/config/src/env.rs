//! Environment variable parsing and env-to-config merging.
//!
//! This module keeps env parsing:
//! - strict (invalid values fail fast)
//! - deterministic (CSV lists normalize to sorted/deduped values)
//! - safe (secret-looking values are redacted in error metadata)

use crate::schema::{HarnessConfig, LogLevelSetting, ValidatedHarnessConfig};
use gc_metrics_shared::{ErrorCode, ErrorEnvelope, redact_if_secret};
use std::collections::BTreeMap;
use std::fmt;

/// Env var: metrics sink file.
pub const ENV_SINK_FILE: &str = "GCM_SINK_FILE";
/// Env var: tailer poll interval in milliseconds.
pub const ENV_TAILER_POLL_INTERVAL_MS: &str = "GCM_TAILER_POLL_INTERVAL_MS";
/// Env var: waiter attempt budget.
pub const ENV_WAITER_MAX_ATTEMPTS: &str = "GCM_WAITER_MAX_ATTEMPTS";
/// Env var: delay between waiter attempts in milliseconds.
pub const ENV_WAITER_DELAY_MS: &str = "GCM_WAITER_DELAY_MS";
/// Env var: metric prefix.
pub const ENV_METRIC_PREFIX: &str = "GCM_METRIC_PREFIX";
/// Env var: expected metric keys (CSV).
pub const ENV_EXPECTED_KEYS: &str = "GCM_EXPECTED_KEYS";
/// Env var: skip the first observed line.
pub const ENV_SKIP_STALE_FIRST: &str = "GCM_SKIP_STALE_FIRST";
/// Env var: minimum log level.
pub const ENV_LOG_LEVEL: &str = "GCM_LOG_LEVEL";

/// Every env var read by [`HarnessEnv::from_std_env`].
pub const HARNESS_ENV_VARS: [&str; 8] = [
    ENV_SINK_FILE,
    ENV_TAILER_POLL_INTERVAL_MS,
    ENV_WAITER_MAX_ATTEMPTS,
    ENV_WAITER_DELAY_MS,
    ENV_METRIC_PREFIX,
    ENV_EXPECTED_KEYS,
    ENV_SKIP_STALE_FIRST,
    ENV_LOG_LEVEL,
];

const EXPECTED_KEYS_CSV_MAX: usize = crate::schema::EXPECTED_KEYS_MAX;

/// Typed env-derived overrides for `HarnessConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessEnv {
    /// Override for `tailer.sinkFile`.
    pub sink_file: Option<Box<str>>,
    /// Override for `tailer.pollIntervalMs`.
    pub tailer_poll_interval_ms: Option<u64>,
    /// Override for `waiter.maxAttempts`.
    pub waiter_max_attempts: Option<u32>,
    /// Override for `waiter.delayMs`.
    pub waiter_delay_ms: Option<u64>,
    /// Override for `metrics.prefix`.
    pub metric_prefix: Option<Box<str>>,
    /// Override for `metrics.expectedKeys`.
    pub expected_keys: Option<Vec<Box<str>>>,
    /// Override for `metrics.skipStaleFirst`.
    pub skip_stale_first: Option<bool>,
    /// Override for `logging.level`.
    pub log_level: Option<LogLevelSetting>,
}

impl HarnessEnv {
    /// Parse overrides from an explicit variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            sink_file: parse_optional_trimmed_string(map, ENV_SINK_FILE)?,
            tailer_poll_interval_ms: parse_optional_u64(map, ENV_TAILER_POLL_INTERVAL_MS)?,
            waiter_max_attempts: parse_optional_u32(map, ENV_WAITER_MAX_ATTEMPTS)?,
            waiter_delay_ms: parse_optional_u64(map, ENV_WAITER_DELAY_MS)?,
            metric_prefix: parse_optional_trimmed_string(map, ENV_METRIC_PREFIX)?,
            expected_keys: parse_optional_csv_keys(map, ENV_EXPECTED_KEYS)?,
            skip_stale_first: parse_optional_bool(map, ENV_SKIP_STALE_FIRST)?,
            log_level: parse_optional_log_level(map, ENV_LOG_LEVEL)?,
        })
    }

    /// Parse overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in HARNESS_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_owned(), value);
            }
        }
        Self::from_map(&map)
    }

    /// Returns true when no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply env overrides on top of `base`, then validate and normalize.
pub fn apply_env_overrides(
    base: HarnessConfig,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let mut config = base;
    set_clone(&mut config.tailer.sink_file, env.sink_file.as_ref());
    set_copy(
        &mut config.tailer.poll_interval_ms,
        env.tailer_poll_interval_ms,
    );
    set_copy(&mut config.waiter.max_attempts, env.waiter_max_attempts);
    set_copy(&mut config.waiter.delay_ms, env.waiter_delay_ms);
    set_clone(&mut config.metrics.prefix, env.metric_prefix.as_ref());
    set_clone(&mut config.metrics.expected_keys, env.expected_keys.as_ref());
    set_copy(&mut config.metrics.skip_stale_first, env.skip_stale_first);
    set_copy(&mut config.logging.level, env.log_level);

    config.validate_and_normalize().map_err(Into::into)
}

fn set_copy<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_clone<T: Clone>(field: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// CSV list exceeds a safety limit.
    CsvTooLarge {
        /// Env var name.
        var: &'static str,
        /// Number of parsed items.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
            Self::CsvTooLarge { .. } => ErrorCode::new("config", "invalid_env_csv"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
            Self::CsvTooLarge { var, len, max } => {
                write!(formatter, "{var} is too large ({len} items, max {max})")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => {
                envelope = envelope.with_metadata("env_var", var);
            },
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidEnum { var, value } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", redact_if_secret(var, &value));
            },
            EnvParseError::CsvTooLarge { var, len, max } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
        }

        envelope
    }
}

fn non_empty<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<(&'a str, &'a str)>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some((raw.as_str(), trimmed)))
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    Ok(non_empty(map, var)?.map(|(_, trimmed)| Box::from(trimmed)))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some((raw, trimmed)) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.to_owned(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some((raw, trimmed)) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.to_owned(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some((raw, trimmed)) = non_empty(map, var)? else {
        return Ok(None);
    };
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: raw.to_owned(),
        }),
    }
}

fn parse_optional_log_level(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<LogLevelSetting>, EnvParseError> {
    let Some((raw, trimmed)) = non_empty(map, var)? else {
        return Ok(None);
    };
    LogLevelSetting::parse(trimmed)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var,
            value: raw.to_owned(),
        })
}

fn parse_optional_csv_keys(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<Box<str>>>, EnvParseError> {
    let Some((_, trimmed)) = non_empty(map, var)? else {
        return Ok(None);
    };
    let mut keys: Vec<Box<str>> = parse_csv(trimmed).into_iter().map(Box::from).collect();
    keys.sort();
    keys.dedup();
    if keys.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    if keys.len() > EXPECTED_KEYS_CSV_MAX {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: keys.len(),
            max: EXPECTED_KEYS_CSV_MAX,
        });
    }
    Ok(Some(keys))
}

fn parse_csv(input: &str) -> Vec<&str> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn missing_vars_produce_no_overrides() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv::from_map(&BTreeMap::new())?;
        assert!(env.is_empty());
        Ok(())
    }

    #[test]
    fn csv_keys_are_normalized_deterministically() -> Result<(), Box<dyn Error>> {
        let map = env_map(&[(ENV_EXPECTED_KEYS, " AccGcStarted, AccGcFinished,,AccGcStarted ")]);
        let env = HarnessEnv::from_map(&map)?;
        let keys: Option<Vec<&str>> = env
            .expected_keys
            .as_ref()
            .map(|keys| keys.iter().map(|key| &**key).collect());
        assert_eq!(keys, Some(vec!["AccGcFinished", "AccGcStarted"]));
        Ok(())
    }

    #[test]
    fn blank_values_are_rejected() {
        let map = env_map(&[(ENV_SINK_FILE, "   ")]);
        assert_eq!(
            HarnessEnv::from_map(&map),
            Err(EnvParseError::EmptyValue { var: ENV_SINK_FILE })
        );
    }

    #[test]
    fn invalid_numbers_and_bools_are_rejected() {
        let map = env_map(&[(ENV_WAITER_MAX_ATTEMPTS, "-1")]);
        assert!(matches!(
            HarnessEnv::from_map(&map),
            Err(EnvParseError::InvalidInt { var: ENV_WAITER_MAX_ATTEMPTS, .. })
        ));

        let map = env_map(&[(ENV_SKIP_STALE_FIRST, "maybe")]);
        let envelope: Option<ErrorEnvelope> = HarnessEnv::from_map(&map).err().map(Into::into);
        assert!(matches!(
            envelope,
            Some(envelope) if envelope.code == ErrorCode::new("config", "invalid_env_bool")
                && envelope.metadata_value("value") == Some("maybe")
        ));
    }

    #[test]
    fn log_level_accepts_known_names() -> Result<(), Box<dyn Error>> {
        let map = env_map(&[(ENV_LOG_LEVEL, "Debug")]);
        assert_eq!(
            HarnessEnv::from_map(&map)?.log_level,
            Some(LogLevelSetting::Debug)
        );

        let map = env_map(&[(ENV_LOG_LEVEL, "chatty")]);
        assert!(matches!(
            HarnessEnv::from_map(&map),
            Err(EnvParseError::InvalidEnum { .. })
        ));
        Ok(())
    }

    #[test]
    fn overrides_apply_and_validate() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv {
            waiter_max_attempts: Some(3),
            waiter_delay_ms: Some(10),
            skip_stale_first: Some(false),
            ..HarnessEnv::default()
        };
        let config = apply_env_overrides(HarnessConfig::default(), &env)?;
        assert_eq!(config.waiter.max_attempts, 3);
        assert_eq!(config.waiter.delay_ms, 10);
        assert!(!config.metrics.skip_stale_first);

        let env = HarnessEnv {
            waiter_max_attempts: Some(0),
            ..HarnessEnv::default()
        };
        assert!(apply_env_overrides(HarnessConfig::default(), &env).is_err());
        Ok(())
    }
}
