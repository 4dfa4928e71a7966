//! Logging configuration
//!
//! Libraries never install a global subscriber. A [`LogConfig`] builds a
//! `tracing::Dispatch` that the caller installs for a scope
//! (`tracing::dispatcher::with_default`) or hands to the orchestrator.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{Dispatch, Level};

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    Stderr,
    /// Appended to, created if missing; no ANSI colors
    File(PathBuf),
}

/// Log level and sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub sink: LogSink,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            sink: LogSink::Stderr,
        }
    }
}

impl LogConfig {
    /// `DEBUG` when verbose, `INFO` otherwise
    pub fn from_verbosity(verbose: bool, sink: LogSink) -> Self {
        Self {
            level: if verbose { Level::DEBUG } else { Level::INFO },
            sink,
        }
    }

    /// Build the dispatcher. Fails only when the log file cannot be opened.
    pub fn dispatch(&self) -> std::io::Result<Dispatch> {
        let builder = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_target(false);

        let dispatch = match &self.sink {
            LogSink::Stdout => Dispatch::new(builder.with_writer(std::io::stdout).finish()),
            LogSink::Stderr => Dispatch::new(builder.with_writer(std::io::stderr).finish()),
            LogSink::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file: File = OpenOptions::new().create(true).append(true).open(path)?;
                Dispatch::new(
                    builder
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .finish(),
                )
            }
        };
        Ok(dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_sink_receives_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let dispatch = LogConfig::from_verbosity(false, LogSink::File(path.clone()))
            .dispatch()
            .unwrap();

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("processing parcels.geojson");
            tracing::debug!("hidden at info level");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("processing parcels.geojson"));
        assert!(!text.contains("hidden at info level"));
    }

    #[test]
    fn verbosity_maps_to_level() {
        assert_eq!(LogConfig::from_verbosity(true, LogSink::Stderr).level, Level::DEBUG);
        assert_eq!(LogConfig::default().level, Level::INFO);
    }
}
