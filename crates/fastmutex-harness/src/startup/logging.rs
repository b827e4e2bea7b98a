//! Console and file logging for the harness.
//!
//! | Log File            | Content                          | Target Prefixes   |
//! |---------------------|----------------------------------|-------------------|
//! | fastmutex.log       | Root logger (all events)         | (all)             |
//! | lock-protocol.log   | Lock protocol steps and records  | fastmutex_core    |
//!
//! File logging is off unless a log directory is configured.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LogConfig;

const ROOT_LOG_FILE: &str = "fastmutex.log";
const PROTOCOL_LOG_FILE: &str = "lock-protocol.log";
const PROTOCOL_TARGETS: &[&str] = &["fastmutex_core"];

/// Logging configuration for the harness.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Rolling log file directory; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    /// Enable console output
    pub console_output: bool,
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    pub rotation: Rotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            console_output: true,
            level: Level::INFO,
            rotation: Rotation::DAILY,
        }
    }
}

impl From<&LogConfig> for LoggingConfig {
    fn from(config: &LogConfig) -> Self {
        Self {
            log_dir: config.dir.clone(),
            console_output: config.console,
            level: config.level(),
            rotation: Rotation::DAILY,
        }
    }
}

/// Keeps the non-blocking file writers alive; dropping it flushes them.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level for the console and the root
/// file. The protocol file captures everything from the lock crate.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter(config.level));
        layers.push(Box::new(console_layer));
    }

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let root_appender = RollingFileAppender::new(config.rotation.clone(), log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(env_filter(config.level));
        layers.push(Box::new(root_layer));

        let protocol_appender =
            RollingFileAppender::new(config.rotation.clone(), log_dir, PROTOCOL_LOG_FILE);
        let (protocol_nb, protocol_guard) = tracing_appender::non_blocking(protocol_appender);
        guards.push(protocol_guard);
        let mut targets = Targets::new();
        for target in PROTOCOL_TARGETS {
            targets = targets.with_target(*target, LevelFilter::TRACE);
        }
        let protocol_layer = fmt::layer()
            .with_writer(protocol_nb)
            .with_target(true)
            .with_ansi(false)
            .with_filter(targets);
        layers.push(Box::new(protocol_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Some(log_dir) = &config.log_dir {
        tracing::info!(
            log_dir = %log_dir.display(),
            "File logging initialized: {} + {}",
            ROOT_LOG_FILE,
            PROTOCOL_LOG_FILE
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(config.log_dir.is_none());
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_logging_config_from_log_config() {
        let log = LogConfig {
            level: "trace".to_string(),
            console: false,
            dir: Some(PathBuf::from("/tmp/fastmutex-logs")),
        };
        let config = LoggingConfig::from(&log);
        assert!(!config.console_output);
        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/fastmutex-logs")));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let log = LogConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert_eq!(LoggingConfig::from(&log).level, Level::INFO);
    }

    #[test]
    fn test_protocol_log_file_names() {
        assert!(ROOT_LOG_FILE.ends_with(".log"));
        assert!(PROTOCOL_LOG_FILE.ends_with(".log"));
        assert!(!PROTOCOL_TARGETS.is_empty());
    }
}
