use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::{env, path::Path, path::PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Nominal number of requests per producer run
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Target url; `{index}` and `{run}` are substituted per item
    #[serde(default = "default_url")]
    pub url: String,
    /// Enqueue `count` items instead of `count - 1`
    #[serde(default)]
    pub enqueue_full_count: bool,
}

const fn default_count() -> u32 {
    100
}
const fn default_interval_ms() -> u64 {
    100
}
fn default_url() -> String {
    "https://www.boredapi.com/api/activity".to_string()
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            interval_ms: default_interval_ms(),
            url: default_url(),
            enqueue_full_count: false,
        }
    }
}

impl ProducerConfig {
    /// Number of items a single producer run enqueues
    #[must_use]
    pub const fn items_per_run(&self) -> u32 {
        if self.enqueue_full_count {
            self.count
        } else {
            self.count.saturating_sub(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

const fn default_max_per_window() -> u32 {
    3
}
const fn default_window_ms() -> u64 {
    1000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_ms: default_window_ms(),
        }
    }
}

/// What happens to the consumer once the last producer run has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Close the queue and wait until every queued item has been dispatched
    #[default]
    Drain,
    /// Fire the cancellation token; queued items are discarded
    Cancel,
}

impl Display for ShutdownPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drain => write!(f, "drain"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

impl FromStr for ShutdownPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true).map_err(|e| anyhow!("invalid shutdown policy: {e}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Producer runs, separated by `pause_ms`
    #[serde(default = "default_runs")]
    pub runs: u32,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
}

const fn default_runs() -> u32 {
    2
}
const fn default_pause_ms() -> u64 {
    30_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            pause_ms: default_pause_ms(),
            shutdown: ShutdownPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("sluice/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Values given explicitly on the command line. `None` leaves the loaded
/// configuration untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub count: Option<u32>,
    pub interval_ms: Option<u64>,
    pub url: Option<String>,
    pub enqueue_full_count: Option<bool>,
    pub max_per_window: Option<u32>,
    pub window_ms: Option<u64>,
    pub runs: Option<u32>,
    pub pause_ms: Option<u64>,
    pub shutdown: Option<ShutdownPolicy>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid value for {name}: {e}")),
        Err(_) => Ok(None),
    }
}

/// A config file in the search path that exists but could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedConfig {
    pub path: PathBuf,
    pub reason: String,
}

impl Display for SkippedConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of [`Config::load`]
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: Config,
    /// Files passed over on the way to `config`, in search order
    pub skipped: Vec<SkippedConfig>,
}

impl Config {
    /// Load configuration from a TOML file at the specified path
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The file cannot be read
    /// - The TOML content cannot be parsed into the Config structure
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults with `SLUICE_*` environment variables applied
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparsable value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `SLUICE_*` environment variables that are set
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparsable value.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(count) = env_value("SLUICE_COUNT")? {
            self.producer.count = count;
        }
        if let Some(interval) = env_value("SLUICE_INTERVAL_MS")? {
            self.producer.interval_ms = interval;
        }
        if let Ok(url) = env::var("SLUICE_URL") {
            self.producer.url = url;
        }
        if let Some(full) = env_value("SLUICE_ENQUEUE_FULL_COUNT")? {
            self.producer.enqueue_full_count = full;
        }

        if let Some(max) = env_value("SLUICE_MAX_PER_WINDOW")? {
            self.dispatcher.max_per_window = max;
        }
        if let Some(window) = env_value("SLUICE_WINDOW_MS")? {
            self.dispatcher.window_ms = window;
        }

        if let Some(runs) = env_value("SLUICE_RUNS")? {
            self.orchestrator.runs = runs;
        }
        if let Some(pause) = env_value("SLUICE_PAUSE_MS")? {
            self.orchestrator.pause_ms = pause;
        }
        if let Some(shutdown) = env_value("SLUICE_SHUTDOWN")? {
            self.orchestrator.shutdown = shutdown;
        }

        if let Some(timeout) = env_value("SLUICE_TIMEOUT_SECS")? {
            self.http.timeout_secs = timeout;
        }
        if let Ok(user_agent) = env::var("SLUICE_USER_AGENT") {
            self.http.user_agent = user_agent;
        }

        if let Ok(level) = env::var("SLUICE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("SLUICE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Locations searched for a config file, in priority order
    #[must_use]
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("sluice.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("sluice").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/sluice/config.toml"));
        paths
    }

    /// Load configuration from a file and environment variables
    ///
    /// With `explicit` set only that file is read and it must exist. Otherwise
    /// the first readable file among [`Config::default_paths`] is used, falling
    /// back to defaults. Files in the search path that exist but cannot be
    /// read or parsed are passed over and reported in [`Loaded::skipped`].
    ///
    /// The result is not validated: callers merge their overrides first and
    /// then call [`Config::validate`].
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The explicit config file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
        let mut loaded = if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            Loaded {
                config: Self::from_file(path)?,
                skipped: Vec::new(),
            }
        } else {
            Self::search(&Self::default_paths())
        };

        loaded.config.apply_env()?;
        Ok(loaded)
    }

    fn search(paths: &[PathBuf]) -> Loaded {
        let mut skipped = Vec::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => {
                    debug!("Using config from {}", path.display());
                    return Loaded { config, skipped };
                }
                Err(e) => skipped.push(SkippedConfig {
                    path: path.clone(),
                    reason: format!("{e:#}"),
                }),
            }
        }
        debug!("No usable config file found, using defaults");
        Loaded {
            config: Self::default(),
            skipped,
        }
    }

    /// Apply command line overrides on top of this configuration
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(count) = overrides.count {
            self.producer.count = count;
        }
        if let Some(interval) = overrides.interval_ms {
            self.producer.interval_ms = interval;
        }
        if let Some(url) = overrides.url {
            self.producer.url = url;
        }
        if let Some(full) = overrides.enqueue_full_count {
            self.producer.enqueue_full_count = full;
        }
        if let Some(max) = overrides.max_per_window {
            self.dispatcher.max_per_window = max;
        }
        if let Some(window) = overrides.window_ms {
            self.dispatcher.window_ms = window;
        }
        if let Some(runs) = overrides.runs {
            self.orchestrator.runs = runs;
        }
        if let Some(pause) = overrides.pause_ms {
            self.orchestrator.pause_ms = pause;
        }
        if let Some(shutdown) = overrides.shutdown {
            self.orchestrator.shutdown = shutdown;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The producer url is blank or not a valid http(s) url
    /// - Any count, limit or duration that must be positive is zero
    /// - The log format is neither `text` nor `json`
    pub fn validate(&self) -> Result<()> {
        if self.producer.url.trim().is_empty() {
            bail!("producer url must not be empty");
        }
        let sample = crate::producer::render_url(&self.producer.url, 1, 0);
        let url = reqwest::Url::parse(&sample)
            .with_context(|| format!("producer url is not a valid url: {}", self.producer.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("producer url must use http or https, got {}", url.scheme());
        }

        if self.producer.count == 0 {
            bail!("count must be greater than 0");
        }
        if self.dispatcher.max_per_window == 0 {
            bail!("max_per_window must be greater than 0");
        }
        if self.dispatcher.window_ms == 0 {
            bail!("window_ms must be greater than 0");
        }
        if self.orchestrator.runs == 0 {
            bail!("runs must be greater than 0");
        }
        if self.http.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            bail!("log format must be \"text\" or \"json\", got {:?}", self.logging.format);
        }

        Ok(())
    }
}
