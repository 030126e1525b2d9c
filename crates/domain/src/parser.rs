//! Tolerant parser for flat `key=value, key=value` metric lines.
//!
//! Only tokens carrying the metric prefix are considered; everything else on
//! the line is ignored. A prefixed token that cannot be read is an error.

use crate::Sample;
use gc_metrics_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// A prefixed token that could not be turned into a metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The token has no `=`.
    MissingSeparator {
        /// Trimmed token.
        token: String,
    },
    /// The key is empty after trimming.
    EmptyKey {
        /// Trimmed token.
        token: String,
    },
    /// The value is empty or not a signed 64-bit integer.
    InvalidValue {
        /// Metric name.
        key: String,
        /// Raw value text.
        value: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator { token } => {
                write!(formatter, "metric token `{token}` has no `=` separator")
            },
            Self::EmptyKey { token } => write!(formatter, "metric token `{token}` has no key"),
            Self::InvalidValue { key, value } => {
                write!(formatter, "metric `{key}` has non-integer value `{value}`")
            },
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for ErrorEnvelope {
    fn from(error: ParseError) -> Self {
        let envelope = Self::expected(ErrorCode::metrics_parse_error(), error.to_string());
        match error {
            ParseError::MissingSeparator { token } | ParseError::EmptyKey { token } => {
                envelope.with_metadata("token", token)
            },
            ParseError::InvalidValue { key, value } => envelope
                .with_metadata("key", key)
                .with_metadata("value", value),
        }
    }
}

/// Returns true if a trimmed token belongs to the metric family.
#[must_use]
pub fn is_metric_token(token: &str, prefix: &str) -> bool {
    !token.is_empty() && token.starts_with(prefix)
}

/// Parse one metrics line into a sample.
///
/// Absent or blank lines yield an empty sample. A key repeated on the line
/// keeps its last value.
pub fn parse_line(line: Option<&str>, prefix: &str) -> Result<Sample, ParseError> {
    let mut sample = Sample::new();
    let Some(line) = line else {
        return Ok(sample);
    };

    for token in line.split(',').map(str::trim) {
        if !is_metric_token(token, prefix) {
            continue;
        }
        let (key, value) = parse_token(token)?;
        sample.insert(key, value);
    }

    Ok(sample)
}

fn parse_token(token: &str) -> Result<(&str, i64), ParseError> {
    let Some((key, value)) = token.split_once('=') else {
        return Err(ParseError::MissingSeparator {
            token: token.to_owned(),
        });
    };
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey {
            token: token.to_owned(),
        });
    }
    let parsed = value
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        })?;
    Ok((key, parsed))
}
