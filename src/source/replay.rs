//! Recorded-log simulation source.
//!
//! Replays a previously captured telemetry log as if it came from a live
//! adapter. The log format is opaque here: one record per line, blank lines
//! and `#` comments are skipped.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, Lines};

use super::{DeviceConnector, TelemetryLink, TelemetryRecord};
use crate::error::{AcquisitionError, MonitorError, MonitorResult};

/// Returns the record text of a log line, or `None` if the line is skipped.
fn record_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        None
    } else {
        Some(trimmed)
    }
}

/// An opened simulation log.
///
/// Opening validates that the file exists and can be read line by line. The
/// source itself keeps no handle; every monitoring run gets its own
/// sequential reader via [`SimulationSource::connector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSource {
    path: PathBuf,
    description: String,
    interval: Duration,
    record_count: u64,
}

impl SimulationSource {
    /// Open the log at `path`.
    ///
    /// Relative paths that do not exist in the working directory are looked
    /// up in `log_directory`. `interval` is the pause between replayed
    /// records.
    pub fn open(path: &Path, log_directory: Option<&Path>, interval: Duration) -> MonitorResult<Self> {
        let resolved = resolve(path, log_directory);

        let metadata = fs::metadata(&resolved)
            .map_err(|e| MonitorError::source_unavailable(&resolved, e))?;
        if !metadata.is_file() {
            return Err(MonitorError::source_unavailable(&resolved, "not a regular file"));
        }

        let file =
            fs::File::open(&resolved).map_err(|e| MonitorError::source_unavailable(&resolved, e))?;
        let mut record_count = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| MonitorError::source_unavailable(&resolved, e))?;
            if record_text(&line).is_some() {
                record_count += 1;
            }
        }

        let description = format!("log: {}", resolved.display());
        Ok(Self {
            path: resolved,
            description,
            interval,
            record_count,
        })
    }

    /// Returns the resolved path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a human-readable description of the source.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of records found when the log was opened.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Connector handing out a fresh replay of this log per run.
    pub fn connector(&self) -> Arc<dyn DeviceConnector> {
        Arc::new(ReplayConnector {
            path: self.path.clone(),
            interval: self.interval,
            description: self.description.clone(),
        })
    }

    /// Release the log.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "simulation log closed");
    }
}

fn resolve(path: &Path, log_directory: Option<&Path>) -> PathBuf {
    if path.is_relative() && !path.exists() {
        if let Some(dir) = log_directory {
            return dir.join(path);
        }
    }
    path.to_path_buf()
}

#[derive(Debug)]
struct ReplayConnector {
    path: PathBuf,
    interval: Duration,
    description: String,
}

#[async_trait]
impl DeviceConnector for ReplayConnector {
    async fn connect(&self) -> Result<Box<dyn TelemetryLink>, AcquisitionError> {
        let replay = LogReplay::open(&self.path, self.interval).await?;
        Ok(Box::new(replay))
    }

    async fn check_link(&self) -> Result<String, AcquisitionError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| format!("{} ({} bytes)", self.description, m.len()))
            .map_err(|e| AcquisitionError::Io(e.to_string()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Sequential, paced reader over a simulation log.
#[derive(Debug)]
pub struct LogReplay {
    lines: Lines<tokio::io::BufReader<tokio::fs::File>>,
    path: PathBuf,
    description: String,
    interval: Duration,
    line_number: u64,
    sequence: u64,
}

impl LogReplay {
    /// Open the log for replay.
    pub async fn open(path: &Path, interval: Duration) -> Result<Self, AcquisitionError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| AcquisitionError::Replay {
            path: path.to_path_buf(),
            line: 0,
            reason: e.to_string(),
        })?;
        Ok(Self {
            lines: tokio::io::BufReader::new(file).lines(),
            path: path.to_path_buf(),
            description: format!("log: {}", path.display()),
            interval,
            line_number: 0,
            sequence: 0,
        })
    }
}

#[async_trait]
impl TelemetryLink for LogReplay {
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, AcquisitionError> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => {
                    return Err(AcquisitionError::Replay {
                        path: self.path.clone(),
                        line: self.line_number + 1,
                        reason: e.to_string(),
                    })
                }
            };
            self.line_number += 1;

            let Some(text) = record_text(&line) else {
                continue;
            };

            // Pace every record after the first one
            if self.sequence > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            self.sequence += 1;
            return Ok(Some(TelemetryRecord::new(self.sequence, text)));
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}
