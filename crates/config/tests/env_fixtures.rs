//! Integration tests for env override fixtures.

use gc_metrics_config::{
    EnvParseError, HarnessConfig, HarnessEnv, LogLevelSetting, apply_env_overrides,
    load_harness_config_from_sources,
};
use gc_metrics_shared::ErrorCode;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

fn read_env_fixture(name: &str) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../testkit/fixtures/env")
        .join(name);
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[test]
fn valid_env_fixture_overrides_defaults() -> Result<(), Box<dyn Error>> {
    let map = read_env_fixture("harness-env.valid.json")?;
    let env = HarnessEnv::from_map(&map)?;
    let config = apply_env_overrides(HarnessConfig::default(), &env)?;

    assert_eq!(&*config.tailer.sink_file, "/var/tmp/gc.metrics.log");
    assert_eq!(config.tailer.poll_interval_ms, 50);
    assert_eq!(config.waiter.max_attempts, 3);
    assert_eq!(config.waiter.delay_ms, 100);
    assert!(!config.metrics.skip_stale_first);
    assert_eq!(config.logging.level, LogLevelSetting::Warn);

    let keys: Vec<&str> = config
        .metrics
        .expected_keys
        .iter()
        .map(|key| &**key)
        .collect();
    assert_eq!(keys, vec!["AccGcFinished", "AccGcStarted", "AccGcWalStarted"]);
    Ok(())
}

#[test]
fn env_fixture_wins_over_config_json() -> Result<(), Box<dyn Error>> {
    let map = read_env_fixture("harness-env.valid.json")?;
    let env = HarnessEnv::from_map(&map)?;
    let config_json = r#"{ "version": 1, "waiter": { "maxAttempts": 50, "delayMs": 9000 } }"#;

    let config = load_harness_config_from_sources(Some(config_json), &env)?;
    assert_eq!(config.waiter.max_attempts, 3);
    assert_eq!(config.waiter.delay_ms, 100);
    Ok(())
}

#[test]
fn invalid_env_fixture_names_the_variable() -> Result<(), Box<dyn Error>> {
    let map = read_env_fixture("harness-env.invalid.json")?;
    let error = HarnessEnv::from_map(&map).err();

    assert!(matches!(
        error,
        Some(EnvParseError::InvalidInt { var: "GCM_WAITER_DELAY_MS", .. })
    ));
    if let Some(error) = error {
        let envelope = gc_metrics_shared::ErrorEnvelope::from(error);
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_env_int"));
    }
    Ok(())
}
