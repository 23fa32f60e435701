use crate::config::{ConfigOverrides, ShutdownPolicy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Set log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Set log format (text or json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Increase verbosity
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration file
    Init {
        /// Path to create the config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Don't prompt for input, use defaults
        #[arg(long)]
        no_prompt: bool,

        /// Force overwrite if config file exists
        #[arg(long)]
        force: bool,
    },

    /// Enqueue requests and dispatch them under the configured rate limit
    Run {
        /// Nominal number of requests per producer run
        #[arg(long)]
        count: Option<u32>,

        /// Milliseconds between enqueued requests
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Target url; {index} and {run} are substituted per request
        #[arg(long)]
        url: Option<String>,

        /// Enqueue exactly --count requests per run instead of count - 1
        #[arg(long)]
        enqueue_full_count: bool,

        /// Maximum requests dispatched per window
        #[arg(long)]
        max_per_window: Option<u32>,

        /// Window duration in milliseconds
        #[arg(long)]
        window_ms: Option<u64>,

        /// Number of producer runs
        #[arg(long)]
        runs: Option<u32>,

        /// Milliseconds to pause between producer runs
        #[arg(long)]
        pause_ms: Option<u64>,

        /// What to do with queued requests after the last run
        #[arg(long, value_enum)]
        shutdown: Option<ShutdownPolicy>,

        /// HTTP request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Write completed requests to this file as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Every value given on the command line, ready to merge into a loaded config
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = self.command.overrides();
        overrides.log_level = if self.verbose {
            Some("debug".to_string())
        } else {
            self.log_level.clone()
        };
        overrides.log_format.clone_from(&self.log_format);
        overrides
    }
}

impl Commands {
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        match self {
            Self::Init { .. } => ConfigOverrides::default(),
            Self::Run {
                count,
                interval_ms,
                url,
                enqueue_full_count,
                max_per_window,
                window_ms,
                runs,
                pause_ms,
                shutdown,
                timeout_secs,
                output: _,
            } => ConfigOverrides {
                count: *count,
                interval_ms: *interval_ms,
                url: url.clone(),
                enqueue_full_count: enqueue_full_count.then_some(true),
                max_per_window: *max_per_window,
                window_ms: *window_ms,
                runs: *runs,
                pause_ms: *pause_ms,
                shutdown: *shutdown,
                timeout_secs: *timeout_secs,
                ..ConfigOverrides::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "sluice",
            "--log-format",
            "json",
            "run",
            "--count",
            "5",
            "--interval-ms",
            "0",
            "--max-per-window",
            "2",
            "--shutdown",
            "cancel",
            "--enqueue-full-count",
        ]);

        let overrides = cli.overrides();
        assert_eq!(overrides.count, Some(5));
        assert_eq!(overrides.interval_ms, Some(0));
        assert_eq!(overrides.max_per_window, Some(2));
        assert_eq!(overrides.window_ms, None);
        assert_eq!(overrides.shutdown, Some(ShutdownPolicy::Cancel));
        assert_eq!(overrides.enqueue_full_count, Some(true));
        assert_eq!(overrides.log_format.as_deref(), Some("json"));
        assert_eq!(overrides.log_level, None);
    }

    #[test]
    fn test_verbose_forces_debug() {
        let cli = Cli::parse_from(["sluice", "-v", "--log-level", "warn", "run"]);
        assert_eq!(cli.overrides().log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unset_flags_do_not_override() {
        let cli = Cli::parse_from(["sluice", "run"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.count, None);
        assert_eq!(overrides.enqueue_full_count, None);
        assert_eq!(overrides.shutdown, None);
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::parse_from(["sluice", "init", "--config", "/tmp/sluice.toml", "--no-prompt"]);
        match cli.command {
            Commands::Init {
                config,
                no_prompt,
                force,
            } => {
                assert_eq!(config, Some(PathBuf::from("/tmp/sluice.toml")));
                assert!(no_prompt);
                assert!(!force);
            }
            Commands::Run { .. } => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_invalid_shutdown_rejected() {
        let result = Cli::try_parse_from(["sluice", "run", "--shutdown", "later"]);
        assert!(result.is_err());
    }
}
