//! Result helpers for shared error handling.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Extension helpers for results carrying an `ErrorEnvelope`.
pub trait ResultExt<T> {
    /// Attach a metadata entry to the error, preserving the success value.
    fn with_error_metadata(self, key: &str, value: impl Into<String>) -> Result<T>;

    /// Attach a metadata entry computed lazily from the error.
    fn with_error_metadata_from<F>(self, key: &str, value: F) -> Result<T>
    where
        F: FnOnce(&ErrorEnvelope) -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_error_metadata(self, key: &str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.with_metadata(key, value))
    }

    fn with_error_metadata_from<F>(self, key: &str, value: F) -> Result<T>
    where
        F: FnOnce(&ErrorEnvelope) -> String,
    {
        self.map_err(|error| {
            let value = value(&error);
            error.with_metadata(key, value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn with_error_metadata_leaves_ok_untouched() {
        let value: Result<i32> = Ok(1);
        let tagged = value.with_error_metadata("phase", "parse");

        assert!(matches!(tagged, Ok(1)));
    }

    #[test]
    fn with_error_metadata_tags_errors() {
        let value: Result<i32> = Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad"));
        let tagged = value.with_error_metadata("phase", "parse");

        assert!(tagged.is_err());
        if let Err(error) = tagged {
            assert_eq!(error.metadata_value("phase"), Some("parse"));
        }
    }

    #[test]
    fn with_error_metadata_from_reads_the_error() {
        let value: Result<()> = Err(ErrorEnvelope::timed_out("late"));
        let tagged = value.with_error_metadata_from("code", |error| error.code.to_string());

        if let Err(error) = tagged {
            assert_eq!(error.metadata_value("code"), Some("core:timeout"));
        }
    }
}
