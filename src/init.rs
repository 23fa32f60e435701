use anyhow::{anyhow, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, ShutdownPolicy};
use crate::producer::render_url;

pub struct InitOptions {
    pub config_path: Option<PathBuf>,
    pub no_prompt: bool,
    pub force: bool,
}

/// Where `init` writes when no path is given
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sluice")
        .join("config.toml")
}

async fn probe_endpoint(url: &str, timeout: Duration) -> Result<u16> {
    let response = Client::new().get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("endpoint answered with {status}"));
    }
    Ok(status.as_u16())
}

async fn prompt(config: &mut Config) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("Initializing sluice configuration...\n");

    config.producer.url = Input::with_theme(&theme)
        .with_prompt("Target url ({index} and {run} are substituted)")
        .with_initial_text(config.producer.url.clone())
        .interact_text()?;

    config.producer.count = Input::with_theme(&theme)
        .with_prompt("Requests per producer run")
        .default(config.producer.count)
        .interact_text()?;

    config.producer.interval_ms = Input::with_theme(&theme)
        .with_prompt("Milliseconds between enqueued requests")
        .default(config.producer.interval_ms)
        .interact_text()?;

    config.dispatcher.max_per_window = Input::with_theme(&theme)
        .with_prompt("Maximum requests per window")
        .default(config.dispatcher.max_per_window)
        .interact_text()?;

    config.dispatcher.window_ms = Input::with_theme(&theme)
        .with_prompt("Window duration in milliseconds")
        .default(config.dispatcher.window_ms)
        .interact_text()?;

    let policies = [ShutdownPolicy::Drain, ShutdownPolicy::Cancel];
    let selected = Select::with_theme(&theme)
        .with_prompt("After the last run")
        .items(&["drain the queue", "cancel outstanding requests"])
        .default(0)
        .interact()?;
    config.orchestrator.shutdown = policies[selected];

    let probe = Confirm::with_theme(&theme)
        .with_prompt("Send one test request to the target now?")
        .default(false)
        .interact()?;
    if probe {
        print!("Testing endpoint... ");
        let url = render_url(&config.producer.url, 1, 0);
        match probe_endpoint(&url, Duration::from_secs(config.http.timeout_secs)).await {
            Ok(status) => println!("✓ {status}"),
            Err(e) => {
                println!("✗ Failed");
                return Err(anyhow!("Endpoint check failed: {e}"));
            }
        }
    }

    Ok(())
}

/// Write a new config file, prompting for the main settings unless
/// `no_prompt` is set. Returns the path written.
///
/// # Errors
///
/// Returns an error if:
/// - The file exists and `force` is not set
/// - The parent directory or the file cannot be written
/// - A prompt fails or the entered values do not validate
/// - The optional endpoint check fails
pub async fn initialize_config(opts: InitOptions) -> Result<PathBuf> {
    let config_path = opts.config_path.unwrap_or_else(default_config_path);

    if config_path.exists() && !opts.force {
        return Err(anyhow!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        ));
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut config = Config::default();
    if !opts.no_prompt {
        prompt(&mut config).await?;
    }
    config.validate()?;

    let toml = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, toml)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("\nConfiguration created at: {}", config_path.display());
    Ok(config_path)
}
