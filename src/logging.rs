// ABOUTME: Tracing subscriber setup for the terminal client.
// ABOUTME: Logs go to a daily rolling file since stdout belongs to the chat view.

use anyhow::{Context, Result};
use chatline_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "chatline.log";

/// Build the filter: RUST_LOG wins, then the configured level
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid logging.level: {}", config.level)),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the program.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<WorkerGuard> {
    let dir = config.log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let json_layer = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(writer.clone()));
    let text_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });
    let stderr_layer =
        verbose.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(json_layer)
        .with(text_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(dir = %dir.display(), json = config.json, "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "chatline=loudest".into(),
            ..Default::default()
        };
        assert!(env_filter(&config).is_err());
        assert!(env_filter(&LoggingConfig::default()).is_ok());
    }
}
