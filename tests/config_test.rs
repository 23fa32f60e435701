use std::{env, fs};

use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use sluice::config::Config;
use sluice::{ConfigOverrides, ShutdownPolicy};

#[test]
fn test_config_from_file() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("config.toml");

    let config_content = r#"
        [producer]
        count = 5
        interval_ms = 250
        url = "https://api.example.test/activity?key={index}"
        enqueue_full_count = true

        [dispatcher]
        max_per_window = 2
        window_ms = 500

        [orchestrator]
        runs = 3
        pause_ms = 1_000
        shutdown = "cancel"

        [http]
        timeout_secs = 10

        [logging]
        level = "debug"
        format = "json"
    "#;

    fs::write(&config_path, config_content)?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.producer.count, 5);
    assert_eq!(config.producer.interval_ms, 250);
    assert_eq!(
        config.producer.url,
        "https://api.example.test/activity?key={index}"
    );
    assert!(config.producer.enqueue_full_count);
    assert_eq!(config.producer.items_per_run(), 5);
    assert_eq!(config.dispatcher.max_per_window, 2);
    assert_eq!(config.dispatcher.window_ms, 500);
    assert_eq!(config.orchestrator.runs, 3);
    assert_eq!(config.orchestrator.pause_ms, 1_000);
    assert_eq!(config.orchestrator.shutdown, ShutdownPolicy::Cancel);
    assert_eq!(config.http.timeout_secs, 10);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    config.validate()?;

    Ok(())
}

#[test]
fn test_partial_file_keeps_defaults() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[dispatcher]\nmax_per_window = 7\n")?;

    let config = Config::from_file(&config_path)?;
    let defaults = Config::default();
    assert_eq!(config.dispatcher.max_per_window, 7);
    assert_eq!(config.dispatcher.window_ms, defaults.dispatcher.window_ms);
    assert_eq!(config.producer, defaults.producer);
    assert_eq!(config.orchestrator, defaults.orchestrator);
    Ok(())
}

#[test]
fn test_malformed_file_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[dispatcher]\nmax_per_window = \"many\"\n")?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(Config::load(Some(&missing)).is_err());
}

struct EnvGuard {
    vars: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn new(vars: Vec<&'static str>) -> Self {
        let vars = vars
            .into_iter()
            .map(|var| (var, env::var(var).ok()))
            .collect();
        Self { vars }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (var, original_value) in &self.vars {
            match original_value {
                Some(value) => env::set_var(var, value),
                None => env::remove_var(var),
            }
        }
    }
}

// The only test in this binary that touches SLUICE_* variables, so it cannot
// race with the file tests above.
#[test]
fn test_load_with_env_override() -> Result<()> {
    let _env_guard = EnvGuard::new(vec![
        "SLUICE_COUNT",
        "SLUICE_MAX_PER_WINDOW",
        "SLUICE_SHUTDOWN",
        "SLUICE_URL",
    ]);

    let dir = tempdir()?;
    let config_path = dir.path().join("sluice.toml");
    fs::write(
        &config_path,
        r#"
        [producer]
        count = 5
        url = "https://file.example.test/{index}"

        [dispatcher]
        max_per_window = 2
        window_ms = 750
        "#,
    )?;

    env::remove_var("SLUICE_URL");
    env::set_var("SLUICE_COUNT", "9");
    env::set_var("SLUICE_MAX_PER_WINDOW", "4");
    env::set_var("SLUICE_SHUTDOWN", "cancel");

    let config = Config::load(Some(&config_path))?.config;

    // environment wins over the file
    assert_eq!(config.producer.count, 9);
    assert_eq!(config.dispatcher.max_per_window, 4);
    assert_eq!(config.orchestrator.shutdown, ShutdownPolicy::Cancel);
    // the file wins over defaults
    assert_eq!(config.producer.url, "https://file.example.test/{index}");
    assert_eq!(config.dispatcher.window_ms, 750);

    env::set_var("SLUICE_COUNT", "lots");
    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(err.to_string().contains("SLUICE_COUNT"));

    // loading leaves validation to the caller, so an override can still repair
    // a bad file value
    env::remove_var("SLUICE_COUNT");
    env::remove_var("SLUICE_MAX_PER_WINDOW");
    fs::write(&config_path, "[dispatcher]\nmax_per_window = 0\n")?;
    let mut config = Config::load(Some(&config_path))?.config;
    assert_eq!(config.dispatcher.max_per_window, 0);
    assert!(config.validate().is_err());

    config.merge(ConfigOverrides {
        max_per_window: Some(2),
        ..ConfigOverrides::default()
    });
    config.validate()?;

    Ok(())
}
