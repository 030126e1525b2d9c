//! Harness configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization trims strings and sorts/dedups the expected key list.

use gc_metrics_domain::{ExpectedKeySet, GC_EXPECTED_KEYS, GC_METRIC_PREFIX};
use gc_metrics_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Default location of the metrics sink file.
pub const DEFAULT_SINK_FILE: &str = "metrics/gc.metrics.log";

const TAILER_POLL_INTERVAL_MIN_MS: u64 = 10;
const TAILER_POLL_INTERVAL_MAX_MS: u64 = 60_000;
const TAILER_POLL_INTERVAL_DEFAULT_MS: u64 = 1_000;

const WAITER_MAX_ATTEMPTS_MIN: u32 = 1;
const WAITER_MAX_ATTEMPTS_MAX: u32 = 1_000;
const WAITER_MAX_ATTEMPTS_DEFAULT: u32 = 20;
const WAITER_DELAY_MIN_MS: u64 = 1;
const WAITER_DELAY_MAX_MS: u64 = 600_000;
const WAITER_DELAY_DEFAULT_MS: u64 = 5_000;

/// Maximum number of expected metric keys.
pub const EXPECTED_KEYS_MAX: usize = 256;

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HarnessConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Background tailer settings.
    pub tailer: TailerConfig,
    /// Update waiter settings.
    pub waiter: WaiterConfig,
    /// Metric line settings.
    pub metrics: MetricsConfig,
    /// Structured logging settings.
    pub logging: LoggingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            tailer: TailerConfig::default(),
            waiter: WaiterConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedHarnessConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.tailer.normalize();
        self.tailer.validate()?;
        self.waiter.validate()?;
        self.metrics.normalize();
        self.metrics.validate()?;

        let limits = HarnessLimits::new(&self)?;
        Ok(ValidatedHarnessConfig { raw: self, limits })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Validated config wrapper carrying bounded numeric values.
#[derive(Debug, Clone)]
pub struct ValidatedHarnessConfig {
    raw: HarnessConfig,
    limits: HarnessLimits,
}

impl ValidatedHarnessConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &HarnessLimits {
        &self.limits
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &HarnessConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> HarnessConfig {
        self.raw
    }

    /// Path of the metrics sink file.
    #[must_use]
    pub fn sink_path(&self) -> PathBuf {
        PathBuf::from(&*self.raw.tailer.sink_file)
    }

    /// Expected metric keys as a domain key set.
    #[must_use]
    pub fn expected_key_set(&self) -> ExpectedKeySet {
        ExpectedKeySet::new(self.raw.metrics.expected_keys.iter())
    }
}

impl AsRef<HarnessConfig> for ValidatedHarnessConfig {
    fn as_ref(&self) -> &HarnessConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedHarnessConfig {
    type Target = HarnessConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct HarnessLimits {
    /// Tailer poll interval (ms).
    pub tailer_poll_interval_ms: BoundedU64<TAILER_POLL_INTERVAL_MIN_MS, TAILER_POLL_INTERVAL_MAX_MS>,
    /// Waiter attempt budget.
    pub waiter_max_attempts: BoundedU32<WAITER_MAX_ATTEMPTS_MIN, WAITER_MAX_ATTEMPTS_MAX>,
    /// Delay between waiter attempts (ms).
    pub waiter_delay_ms: BoundedU64<WAITER_DELAY_MIN_MS, WAITER_DELAY_MAX_MS>,
}

impl HarnessLimits {
    fn new(config: &HarnessConfig) -> Result<Self, ConfigSchemaError> {
        Ok(Self {
            tailer_poll_interval_ms: bounded_u64(
                "tailer",
                "pollIntervalMs",
                config.tailer.poll_interval_ms,
            )?,
            waiter_max_attempts: bounded_u32("waiter", "maxAttempts", config.waiter.max_attempts)?,
            waiter_delay_ms: bounded_u64("waiter", "delayMs", config.waiter.delay_ms)?,
        })
    }

    /// Tailer poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tailer_poll_interval_ms.get())
    }

    /// Delay between waiter attempts.
    #[must_use]
    pub const fn waiter_delay(&self) -> Duration {
        Duration::from_millis(self.waiter_delay_ms.get())
    }
}

/// Parse a harness config from a JSON string, applying validation and normalization.
pub fn parse_harness_config_json(input: &str) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config: HarnessConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a harness config from a TOML string, applying validation and normalization.
pub fn parse_harness_config_toml(input: &str) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config: HarnessConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Background tailer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TailerConfig {
    /// Metrics sink file the harness observes.
    pub sink_file: Box<str>,
    /// Delay between two reads of the sink file (ms).
    pub poll_interval_ms: u64,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            sink_file: DEFAULT_SINK_FILE.into(),
            poll_interval_ms: TAILER_POLL_INTERVAL_DEFAULT_MS,
        }
    }
}

impl TailerConfig {
    fn normalize(&mut self) {
        self.sink_file = self.sink_file.trim().into();
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.sink_file.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                section: "tailer",
                field: "sinkFile",
            });
        }
        validate_timeout_ms(
            "tailer",
            "pollIntervalMs",
            self.poll_interval_ms,
            TAILER_POLL_INTERVAL_MIN_MS,
            TAILER_POLL_INTERVAL_MAX_MS,
        )
    }
}

/// Update waiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct WaiterConfig {
    /// Maximum number of polls before giving up.
    pub max_attempts: u32,
    /// Delay after each unsuccessful poll (ms).
    pub delay_ms: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: WAITER_MAX_ATTEMPTS_DEFAULT,
            delay_ms: WAITER_DELAY_DEFAULT_MS,
        }
    }
}

impl WaiterConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u32(
            "waiter",
            "maxAttempts",
            self.max_attempts,
            WAITER_MAX_ATTEMPTS_MIN,
            WAITER_MAX_ATTEMPTS_MAX,
        )?;
        validate_timeout_ms(
            "waiter",
            "delayMs",
            self.delay_ms,
            WAITER_DELAY_MIN_MS,
            WAITER_DELAY_MAX_MS,
        )
    }
}

/// Metric line configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct MetricsConfig {
    /// Prefix selecting the metric family on a line.
    pub prefix: Box<str>,
    /// Metric names every sample must carry.
    pub expected_keys: Vec<Box<str>>,
    /// Discard the first observed line (it may come from a previous run).
    pub skip_stale_first: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: GC_METRIC_PREFIX.into(),
            expected_keys: GC_EXPECTED_KEYS.iter().map(|key| Box::from(*key)).collect(),
            skip_stale_first: true,
        }
    }
}

impl MetricsConfig {
    fn normalize(&mut self) {
        self.prefix = self.prefix.trim().into();
        let mut keys: Vec<Box<str>> = self
            .expected_keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(Box::from)
            .collect();
        keys.sort();
        keys.dedup();
        self.expected_keys = keys;
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.prefix.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                section: "metrics",
                field: "prefix",
            });
        }
        if self.expected_keys.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                section: "metrics",
                field: "expectedKeys",
            });
        }
        if self.expected_keys.len() > EXPECTED_KEYS_MAX {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "metrics",
                field: "expectedKeys",
                len: self.expected_keys.len(),
                max: EXPECTED_KEYS_MAX,
            });
        }
        if let Some(key) = self
            .expected_keys
            .iter()
            .find(|key| !key.starts_with(&*self.prefix))
        {
            return Err(ConfigSchemaError::KeyOutsidePrefix {
                key: key.to_string(),
                prefix: self.prefix.to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Minimum level emitted.
    pub level: LogLevelSetting,
}

/// Configured minimum log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevelSetting {
    /// Everything, including per-poll diagnostics.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Timeouts and failures.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevelSetting {
    /// Parse a level name (case-insensitive).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Lowercase level name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Validation failures for the harness config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A duration value is out of bounds.
    TimeoutOutOfRange {
        /// Schema section (e.g. `waiter`).
        section: &'static str,
        /// Field name in the config file (e.g. `delayMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `waiter`).
        section: &'static str,
        /// Field name in the config file (e.g. `maxAttempts`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A list field exceeds the maximum allowed size.
    ListTooLarge {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Number of entries after normalization/deduplication.
        len: usize,
        /// Maximum allowed number of entries.
        max: usize,
    },
    /// A required value is empty after trimming.
    EmptyValue {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
    },
    /// An expected key does not carry the metric prefix.
    KeyOutsidePrefix {
        /// Offending key.
        key: String,
        /// Configured prefix.
        prefix: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
            Self::ListTooLarge { .. } => ErrorCode::new("config", "list_too_large"),
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_value"),
            Self::KeyOutsidePrefix { .. } => ErrorCode::new("config", "invalid_expected_key"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    formatter,
                    "unsupported config version: {found} (supported: {supported})"
                )
            },
            Self::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::ListTooLarge {
                section,
                field,
                len,
                max,
            } => write!(
                formatter,
                "{section}.{field} must have at most {max} entries (got {len})"
            ),
            Self::EmptyValue { section, field } => {
                write!(formatter, "{section}.{field} must be non-empty")
            },
            Self::KeyOutsidePrefix { key, prefix } => {
                write!(formatter, "expected key {key} does not start with {prefix}")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::ListTooLarge {
                section,
                field,
                len,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::EmptyValue { section, field } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
            ConfigSchemaError::KeyOutsidePrefix { key, prefix } => {
                envelope = envelope
                    .with_metadata("key", key)
                    .with_metadata("prefix", prefix);
            },
        }

        envelope
    }
}

const fn validate_timeout_ms(
    section: &'static str,
    field: &'static str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigSchemaError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigSchemaError::TimeoutOutOfRange {
            section,
            field,
            value_ms,
            min_ms,
            max_ms,
        });
    }
    Ok(())
}

const fn validate_limit_u32(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value: value as u64,
            min: min as u64,
            max: max as u64,
        });
    }
    Ok(())
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    section: &'static str,
    field: &'static str,
    value: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|error| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value: u64::from(error.value),
        min: u64::from(error.min),
        max: u64::from(error.max),
    })
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|error| ConfigSchemaError::TimeoutOutOfRange {
        section,
        field,
        value_ms: error.value,
        min_ms: error.min,
        max_ms: error.max,
    })
}
