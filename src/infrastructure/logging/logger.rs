use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::models::LoggingConfig;

const LOG_FILE_NAME: &str = "mill.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Holds the file writer's flush guard for the life of the process.
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Install the global subscriber.
    ///
    /// Console output goes to stderr so `--json` command output on stdout
    /// stays machine-readable. The file layer is always JSON.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;

        // One filter per layer; RUST_LOG wins over the configured level.
        let env_filter = || {
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy()
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if let Some(log_dir) = &config.log_dir {
            let (layer, file_guard) = file_layer(log_dir, &config.rotation, env_filter())?;
            layers.push(layer);
            guard = Some(file_guard);
        }

        // Without a log directory the console is the only sink.
        if config.log_dir.is_none() || config.enable_stdout {
            layers.push(console_layer(&config.format, env_filter()));
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("Failed to install tracing subscriber")?;

        tracing::debug!(
            level = %config.level,
            format = %config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

/// JSON lines in `<log_dir>/mill.log`, written off the async runtime.
fn file_layer(log_dir: &Path, rotation: &str, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard)> {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_dir, rotation)?);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter)
        .boxed();
    Ok((layer, guard))
}

fn console_layer(format: &str, filter: EnvFilter) -> BoxedLayer {
    if format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .with_filter(filter)
            .boxed()
    }
}

fn file_appender(log_dir: &Path, rotation: &str) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    Ok(match rotation {
        "hourly" => rolling::hourly(log_dir, LOG_FILE_NAME),
        "never" => rolling::never(log_dir, LOG_FILE_NAME),
        _ => rolling::daily(log_dir, LOG_FILE_NAME),
    })
}

fn parse_log_level(level: &str) -> Result<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        for (name, level) in [("trace", Level::TRACE), ("Info", Level::INFO), (" warn", Level::WARN)] {
            assert_eq!(parse_log_level(name).unwrap(), level);
        }
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        assert!(file_appender(&log_dir, "never").is_ok());
        assert!(log_dir.is_dir());
    }
}
