//! JSON Schema export for the harness config.

use crate::HarnessConfig;
use schemars::{Schema, schema_for};

/// JSON Schema for `HarnessConfig`.
#[must_use]
pub fn harness_config_schema() -> Schema {
    schema_for!(HarnessConfig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_top_level_sections() {
        let schema = serde_json::to_value(harness_config_schema()).unwrap_or_default();
        let properties = schema.get("properties").and_then(serde_json::Value::as_object);
        assert!(matches!(
            properties,
            Some(properties) if ["version", "tailer", "waiter", "metrics", "logging"]
                .iter()
                .all(|section| properties.contains_key(*section))
        ));
    }
}
