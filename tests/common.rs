#![allow(dead_code)]

use sluice::config::{Config, DispatcherConfig, OrchestratorConfig, ProducerConfig};
use sluice::ShutdownPolicy;

/// Config for a single fast producer run against a fake host
pub fn pipeline_config(count: u32, max_per_window: u32, window_ms: u64) -> Config {
    Config {
        producer: ProducerConfig {
            count,
            interval_ms: 0,
            url: "https://example.test/{run}/{index}".to_string(),
            enqueue_full_count: false,
        },
        dispatcher: DispatcherConfig {
            max_per_window,
            window_ms,
        },
        orchestrator: OrchestratorConfig {
            runs: 1,
            pause_ms: 0,
            shutdown: ShutdownPolicy::Drain,
        },
        ..Default::default()
    }
}

/// Path of the compiled `sluice` binary under test
pub fn sluice_bin() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("sluice").expect("sluice binary is built for integration tests")
}
