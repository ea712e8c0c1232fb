//! Error types for the monitoring core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while acquiring telemetry from a device or a recorded log.
///
/// Messages are kept as strings so the error can be cloned into the
/// session, the notifier and the worker event at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    /// The device could not be reached.
    #[error("Connection to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// Reading from the device failed.
    #[error("Read error: {0}")]
    Io(String),

    /// The device closed the connection while monitoring.
    #[error("Device disconnected")]
    Disconnected,

    /// The device did not answer in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A recorded log could not be replayed.
    #[error("Replay of {path:?} failed at line {line}: {reason}")]
    Replay {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// Errors returned by the monitor controller and the command dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// A start was requested while a worker is starting or running.
    #[error("Monitoring is already running")]
    AlreadyRunning,

    /// A start was requested while the previous worker is still tearing down.
    #[error("Monitoring is still stopping")]
    AlreadyStopping,

    /// The simulation log is missing or unreadable.
    #[error("Simulation log {path:?} unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The acquisition worker failed.
    #[error("Acquisition failed: {0}")]
    AcquisitionFailure(#[from] AcquisitionError),

    /// A command identifier that no trigger is bound to.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl MonitorError {
    /// Returns true for errors caused by issuing a command in the wrong state.
    ///
    /// These are absorbed by the dispatcher and never shown to the user.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, MonitorError::AlreadyRunning | MonitorError::AlreadyStopping)
    }

    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MonitorError::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used throughout the monitoring core.
pub type MonitorResult<T> = Result<T, MonitorError>;
