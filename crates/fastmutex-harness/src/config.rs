//! Configuration management for the fastmutex harness
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. `conf/fastmutex.yml` (or the file given with `--config`)
//! 3. `FASTMUTEX__<SECTION>__<KEY>` environment variables
//! 4. command-line flags

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Config, ConfigError, Environment};
use fastmutex_core::{FastMutexConfig, default_store_dir};
use serde::{Deserialize, Serialize};
use tracing::Level;

const DEFAULT_CONFIG_FILE: &str = "conf/fastmutex";
const ENV_PREFIX: &str = "FASTMUTEX";

/// Command line arguments for the harness
#[derive(Debug, Parser)]
#[command(name = "fastmutex-harness", version, about = "Exercise fastmutex under contention")]
pub struct Cli {
    /// Configuration file (default: conf/fastmutex.yml, optional)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Backing store for lock flags and the shared counter
    #[arg(long = "store", value_enum)]
    pub store: Option<StoreKind>,

    /// Directory of the file store
    #[arg(long = "store-dir", env = "FASTMUTEX_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Lock acquisition timeout in milliseconds
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Fixed client identity instead of a random one
    #[arg(long = "client-id")]
    pub client_id: Option<String>,

    /// Console and file log level
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Write rolling log files to this directory
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,

    /// Print lock metrics in Prometheus format when done
    #[arg(long = "metrics")]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Spawn contenders in this process and check that no increment is lost
    Race(RaceArgs),
    /// Join a multi-process run starting on the next quarter minute
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RaceArgs {
    /// Number of concurrent contenders
    #[arg(short = 'n', long = "contenders", default_value_t = 5)]
    pub contenders: usize,

    /// Time spent inside the critical section, in milliseconds
    #[arg(long = "hold-ms", default_value_t = 35)]
    pub hold_ms: u64,

    /// Lock name
    #[arg(long = "key", default_value = "the-lock")]
    pub key: String,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Number of runs to take part in (0 = forever)
    #[arg(long = "runs", default_value_t = 1)]
    pub runs: u32,

    /// Time spent inside the critical section, in milliseconds
    #[arg(long = "hold-ms", default_value_t = 35)]
    pub hold_ms: u64,

    /// Lock name
    #[arg(long = "key", default_value = "the-lock")]
    pub key: String,

    /// Give up waiting for other participants after this many seconds
    #[arg(long = "settle-timeout-secs", default_value_t = 60)]
    pub settle_timeout_secs: u64,
}

/// Backing store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    File,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            dir: default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub console: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

/// Fully resolved harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub mutex: FastMutexConfig,
    pub store: StoreConfig,
    pub logging: LogConfig,
    pub metrics: bool,
}

impl HarnessConfig {
    /// Resolve configuration for the given command line
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => config::File::from(path.clone()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        if let Some(kind) = cli.store {
            builder = builder.set_override("store.kind", kind.as_str())?;
        }
        if let Some(dir) = &cli.store_dir {
            builder = builder.set_override("store.dir", dir.display().to_string())?;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            builder = builder.set_override("mutex.timeout_ms", timeout_ms as i64)?;
        }
        if let Some(client_id) = &cli.client_id {
            builder = builder.set_override("mutex.client_id", client_id.as_str())?;
        }
        if let Some(level) = &cli.log_level {
            builder = builder.set_override("logging.level", level.as_str())?;
        }
        if let Some(dir) = &cli.log_dir {
            builder = builder.set_override("logging.dir", dir.display().to_string())?;
        }
        if cli.metrics {
            builder = builder.set_override("metrics", true)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("fastmutex-harness").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.mutex.timeout_ms, 5000);
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.store.dir, default_store_dir());
        assert_eq!(config.logging.level(), Level::INFO);
        assert!(!config.metrics);
    }

    #[test]
    fn test_race_args_defaults() {
        let cli = parse(&["race"]);
        match cli.command {
            Command::Race(args) => {
                assert_eq!(args.contenders, 5);
                assert_eq!(args.hold_ms, 35);
                assert_eq!(args.key, "the-lock");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yml");
        std::fs::write(
            &path,
            "mutex:\n  timeout_ms: 1000\n  x_prefix: \"file_x_\"\nstore:\n  kind: file\nlogging:\n  level: debug\n",
        )
        .unwrap();

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--store",
            "memory",
            "--timeout-ms",
            "250",
            "--client-id",
            "tab-42",
            "--metrics",
            "run",
            "--runs",
            "3",
        ]);
        let config = HarnessConfig::load(&cli).unwrap();

        assert_eq!(config.mutex.timeout_ms, 250);
        assert_eq!(config.mutex.x_prefix, "file_x_");
        assert_eq!(config.mutex.y_prefix, "_MUTEX_LOCK_Y_");
        assert_eq!(config.mutex.client_id.as_deref(), Some("tab-42"));
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.logging.level(), Level::DEBUG);
        assert!(config.metrics);

        match cli.command {
            Command::Run(args) => assert_eq!(args.runs, 3),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let cli = parse(&["--config", "/definitely/not/here.yml", "race"]);
        assert!(HarnessConfig::load(&cli).is_err());
    }

    #[test]
    fn test_env_override_uses_double_underscore_prefix() {
        let shipped = concat!(env!("CARGO_MANIFEST_DIR"), "/conf/fastmutex.yml");
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var("FASTMUTEX__LOGGING__CONSOLE", "false") };

        let cli = parse(&["--config", shipped, "race"]);
        let config = HarnessConfig::load(&cli);
        unsafe { std::env::remove_var("FASTMUTEX__LOGGING__CONSOLE") };

        let config = config.unwrap();
        assert!(!config.logging.console);
        assert_eq!(config.mutex.timeout_ms, 5000);
        assert!(
            std::fs::read_to_string(shipped)
                .unwrap()
                .contains("FASTMUTEX__MUTEX__TIMEOUT_MS")
        );
    }
}
