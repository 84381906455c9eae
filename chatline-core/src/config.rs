// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates pipeline limits and provides sensible defaults for everything optional
use crate::paths;
use anyhow::{bail, Context, Result};
use chatline_account::AccountConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Events buffered between the consumer thread and the dispatcher
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How long one blocking fetch waits before re-checking for shutdown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for a single handler invocation
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Upper bound for a single subscriber notification
    #[serde(default = "default_subscriber_timeout_ms")]
    pub subscriber_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            handler_timeout_ms: default_handler_timeout_ms(),
            subscriber_timeout_ms: default_subscriber_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn subscriber_timeout(&self) -> Duration {
        Duration::from_millis(self.subscriber_timeout_ms)
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_handler_timeout_ms() -> u64 {
    10_000
}

fn default_subscriber_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write the log file as JSON lines
    #[serde(default)]
    pub json: bool,
    /// Log directory; defaults to the XDG data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.dir
            .as_deref()
            .map(|d| PathBuf::from(expand_tilde(d)))
            .unwrap_or_else(paths::log_dir)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    let Some(rest) = rest else {
        return path.to_string();
    };
    match directories::BaseDirs::new() {
        Some(base_dirs) => base_dirs
            .home_dir()
            .join(rest)
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string(),
        None => {
            tracing::warn!(
                path = %path,
                "Failed to expand tilde in path: could not determine home directory"
            );
            path.to_string()
        }
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. CHATLINE_CONFIG_PATH env var (if set)
    /// 2. ./chatline.toml (current directory)
    /// 3. ~/.config/chatline/chatline.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("CHATLINE_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "CHATLINE_CONFIG_PATH does not exist, ignoring");
        }

        let local_config = PathBuf::from("chatline.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration with environment variable overrides.
    ///
    /// An explicit `path` must exist; otherwise the standard locations are
    /// searched and defaults are used when none has a file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(config_path) => {
                tracing::info!(path = %config_path.display(), "Loading configuration from file");
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                Self::parse(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?
            }
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without env overrides
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Invalid config TOML")?;
        if let Some(db_path) = config.account.db_path.take() {
            config.account.db_path = Some(expand_tilde(&db_path));
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CHATLINE_ADDR") {
            self.account.addr = Some(addr);
        }
        if let Ok(mail_pw) = std::env::var("CHATLINE_MAIL_PW") {
            self.account.mail_pw = Some(mail_pw);
        }
        if let Ok(backend_type) = std::env::var("CHATLINE_ACCOUNT_TYPE") {
            self.account.backend_type = backend_type;
        }
        if let Ok(level) = std::env::var("CHATLINE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.backend_type.trim().is_empty() {
            bail!("account.type must not be empty");
        }
        if self.pipeline.channel_capacity == 0 {
            bail!("pipeline.channel_capacity must be at least 1");
        }
        if self.pipeline.poll_interval_ms == 0 {
            bail!("pipeline.poll_interval_ms must be at least 1");
        }
        if self.pipeline.handler_timeout_ms == 0 {
            bail!("pipeline.handler_timeout_ms must be at least 1");
        }
        if self.pipeline.subscriber_timeout_ms == 0 {
            bail!("pipeline.subscriber_timeout_ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.account.backend_type, "memory");
        assert_eq!(config.pipeline.channel_capacity, 256);
        assert_eq!(config.pipeline.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.pipeline.handler_timeout(), Duration::from_secs(10));
        assert_eq!(config.pipeline.subscriber_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_pipeline_section() {
        let config = Config::parse("[pipeline]\nchannel_capacity = 8\n").unwrap();
        assert_eq!(config.pipeline.channel_capacity, 8);
        assert_eq!(config.pipeline.poll_interval_ms, 250);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        for toml in [
            "[pipeline]\nchannel_capacity = 0\n",
            "[pipeline]\npoll_interval_ms = 0\n",
            "[pipeline]\nhandler_timeout_ms = 0\n",
            "[pipeline]\nsubscriber_timeout_ms = 0\n",
            "[account]\ntype = \"\"\n",
        ] {
            let config = Config::parse(toml).unwrap();
            assert!(config.validate().is_err(), "accepted: {}", toml);
        }
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[pipeline\n").is_err());
        assert!(Config::parse("[pipeline]\nchannel_capacity = \"lots\"\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), "/abs/path");
        assert_eq!(expand_tilde("relative"), "relative");
        if let Some(base) = directories::BaseDirs::new() {
            let home = base.home_dir().to_string_lossy().to_string();
            assert_eq!(expand_tilde("~/x.db"), format!("{}/x.db", home));
            assert_eq!(expand_tilde("~"), home.trim_end_matches('/'));
        }
    }

    #[test]
    fn test_log_dir_override() {
        let logging = LoggingConfig {
            dir: Some("/var/log/chatline".into()),
            ..Default::default()
        };
        assert_eq!(logging.log_dir(), PathBuf::from("/var/log/chatline"));
        assert_eq!(LoggingConfig::default().log_dir(), paths::log_dir());
    }
}
