//! # gc-metrics-app
//!
//! Application use cases: tailing the metrics sink, waiting for updates, and
//! validating two garbage-collector cycles.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod file_tailer;
pub mod validate_gc_cycles;
pub mod wait_for_update;

pub use file_tailer::{
    FileTailer, FileTailerDeps, FileTailerHandle, FileTailerOptions, last_non_empty_line,
};
pub use validate_gc_cycles::{
    CycleObservation, GcCycleCheckDeps, GcCycleCheckInput, GcCycleReport, validate_gc_cycles,
};
pub use wait_for_update::{
    WaitForUpdateDeps, WaitForUpdateInput, WaitPolicy, WaitState, wait_for_update,
};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_metrics_domain::domain_crate_version;
    use gc_metrics_ports::ports_crate_version;
    use gc_metrics_shared::shared_crate_version;

    fn runtime_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("gc-metrics-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_owned());
            }
        }

        deps
    }

    #[test]
    fn app_depends_only_on_inner_layers() {
        let forbidden = ["gc-metrics-adapters", "gc-metrics-config", "gc-metrics-infra"];
        for dep in runtime_deps() {
            assert!(
                !forbidden.contains(&dep.as_str()),
                "forbidden dependency found: {dep}"
            );
        }
    }

    #[test]
    fn app_can_use_ports_domain_shared() {
        assert!(!app_crate_version().is_empty());
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
