//! Acquisition inputs for the monitoring core.
//!
//! Telemetry is treated as an opaque sequence of text records. The wire
//! protocol spoken with the vehicle adapter and the decoding of CAN frames
//! live outside this crate; a source only has to hand out one record at a
//! time.
//!
//! Two traits form the seam between the acquisition worker and the world:
//!
//! - [`DeviceConnector`] knows how to reach an input (a TCP adapter, a
//!   recorded log, an in-memory feed) and can check that the link is reachable.
//! - [`TelemetryLink`] is an established connection that yields records
//!   until the input ends or fails.
//!
//! Implementations:
//!
//! - [`TcpDevice`]: live adapter speaking newline-delimited text over TCP
//! - [`SimulationSource`]: a recorded log replayed at a fixed pace
//! - [`ChannelDevice`]: scripted in-memory device for embedding and tests

mod channel;
mod replay;
mod stream;

pub use channel::{ChannelDevice, ChannelFeed};
pub use replay::{LogReplay, SimulationSource};
pub use stream::{StreamLink, TcpDevice};

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AcquisitionError;

/// A single telemetry record as received from the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    /// Position of the record within the current connection, starting at 1.
    pub sequence: u64,
    /// Raw record text with surrounding whitespace removed.
    pub line: String,
}

impl TelemetryRecord {
    pub fn new(sequence: u64, line: impl Into<String>) -> Self {
        Self {
            sequence,
            line: line.into(),
        }
    }
}

/// An established acquisition connection.
#[async_trait]
pub trait TelemetryLink: Send {
    /// Wait for the next record.
    ///
    /// Returns `Ok(None)` once the input is exhausted. The returned future
    /// must be safe to drop at any await point; the worker drops it when
    /// cancellation wins the race.
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, AcquisitionError>;

    /// Returns a human-readable description of the connection.
    fn description(&self) -> &str;
}

/// Something an acquisition worker can connect to.
#[async_trait]
pub trait DeviceConnector: Send + Sync + Debug {
    /// Open a new connection for one monitoring run.
    async fn connect(&self) -> Result<Box<dyn TelemetryLink>, AcquisitionError>;

    /// Check that the input is reachable without starting a run.
    ///
    /// Returns a short description of what was found.
    async fn check_link(&self) -> Result<String, AcquisitionError>;

    /// Returns a human-readable description of the input.
    ///
    /// Used for display in the status bar.
    fn description(&self) -> &str;
}
