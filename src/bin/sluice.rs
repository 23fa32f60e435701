use anyhow::{Context, Result};
use clap::Parser;
use sluice::cli::{Cli, Commands};
use sluice::config::{Config, LoggingConfig};
use sluice::transport::create_transport;
use sluice::{initialize_config, InitOptions, Orchestrator, RunSummary, WorkItem};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle init command early as it doesn't need config loading
    if let Commands::Init {
        config,
        no_prompt,
        force,
    } = cli.command
    {
        init_logging(&LoggingConfig {
            level: cli.log_level.unwrap_or_else(|| "info".to_string()),
            format: cli.log_format.unwrap_or_else(|| "text".to_string()),
        });
        initialize_config(InitOptions {
            config_path: config,
            no_prompt,
            force,
        })
        .await?;
        return Ok(());
    }

    let loaded = Config::load(cli.config.as_deref())?;
    // Logging is not up yet; its level may come from the loaded file
    for skipped in &loaded.skipped {
        eprintln!("Warning: skipped config file {skipped}");
    }

    // Validate once, after command line overrides
    let mut config = loaded.config;
    config.merge(cli.overrides());
    config.validate()?;
    init_logging(&config.logging);

    let result = match cli.command {
        Commands::Run { output, .. } => run(config, output).await,
        Commands::Init { .. } => unreachable!(), // Already handled above
    };

    if let Err(ref e) = result {
        eprintln!("{e:#}");
    }
    result
}

fn init_logging(logging: &LoggingConfig) {
    // Leave RUST_LOG users in charge of their own filter
    let filter = std::env::var("RUST_LOG")
        .map_or_else(|_| EnvFilter::new(&logging.level), EnvFilter::new);

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if logging.format == "json" {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

async fn run(config: Config, output: Option<PathBuf>) -> Result<()> {
    let transport = create_transport(&config.http).context("Failed to create HTTP client")?;
    let orchestrator = Orchestrator::new(config);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, canceling");
            cancel.cancel();
        }
    });

    let summary = orchestrator.run(transport).await?;
    let completed = orchestrator.sink().drain();

    if let Some(path) = output {
        write_results(&path, &completed)?;
        info!(path = %path.display(), items = completed.len(), "wrote results");
    }

    print_summary(&summary, completed.len());
    Ok(())
}

fn write_results(path: &Path, items: &[WorkItem]) -> Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(summary: &RunSummary, completed: usize) {
    println!();
    println!("Processing Complete");
    println!("  producer runs:  {}", summary.runs_completed);
    println!("  enqueued:       {}", summary.enqueued);
    println!("  dispatched:     {}", summary.dispatch.dispatched);
    println!("  succeeded:      {completed}");
    println!("  failed:         {}", summary.dispatch.failed);
    println!("  skipped:        {}", summary.dispatch.skipped);
    println!("  throttle waits: {}", summary.dispatch.throttle_waits);
    if summary.canceled {
        println!("  canceled with {} request(s) still queued", summary.left_in_queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_results() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("results.json");
        let mut item = WorkItem::new("https://example.test/a");
        item.attach_payload("ok".to_string())?;

        write_results(&path, std::slice::from_ref(&item))?;

        let written: Vec<WorkItem> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(written, vec![item]);
        Ok(())
    }
}
