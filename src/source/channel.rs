//! Channel-based device.
//!
//! An in-memory device driven through a [`ChannelFeed`]. Useful for
//! embedding the controller in a process that already receives telemetry
//! some other way, and for scripting device behaviour in tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DeviceConnector, TelemetryLink, TelemetryRecord};
use crate::error::AcquisitionError;

/// Items pushed through a [`ChannelFeed`].
#[derive(Debug, Clone)]
enum FeedItem {
    Record(String),
    Fail(AcquisitionError),
    End,
}

#[derive(Debug, Default)]
struct Shared {
    /// Sender for the currently connected link, if any.
    current: Option<mpsc::UnboundedSender<FeedItem>>,
    /// When set, connect and link checks fail with this error.
    refuse: Option<AcquisitionError>,
    connections: usize,
}

/// A device whose records are pushed by the embedding code.
///
/// # Example
///
/// ```
/// use obdwatch::source::ChannelDevice;
///
/// let (feed, device) = ChannelDevice::create("can0");
/// assert!(!feed.is_connected());
/// ```
#[derive(Debug)]
pub struct ChannelDevice {
    shared: Arc<Mutex<Shared>>,
    description: String,
}

/// Producer side of a [`ChannelDevice`].
///
/// Items are delivered to the link of the most recent connection. Sends
/// while nothing is connected are dropped and reported as `false`.
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    shared: Arc<Mutex<Shared>>,
}

impl ChannelDevice {
    /// Create a feed/device pair.
    pub fn create(source_description: &str) -> (ChannelFeed, Self) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let feed = ChannelFeed {
            shared: shared.clone(),
        };
        let device = Self {
            shared,
            description: format!("channel: {}", source_description),
        };
        (feed, device)
    }
}

#[async_trait]
impl DeviceConnector for ChannelDevice {
    async fn connect(&self) -> Result<Box<dyn TelemetryLink>, AcquisitionError> {
        let mut shared = self.shared.lock();
        if let Some(err) = shared.refuse.clone() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.current = Some(tx);
        shared.connections += 1;
        Ok(Box::new(ChannelLink {
            receiver: rx,
            description: self.description.clone(),
            sequence: 0,
        }))
    }

    async fn check_link(&self) -> Result<String, AcquisitionError> {
        match self.shared.lock().refuse.clone() {
            Some(err) => Err(err),
            None => Ok(format!("{} ready", self.description)),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl ChannelFeed {
    /// Push a record line to the connected link.
    pub fn send(&self, line: &str) -> bool {
        self.push(FeedItem::Record(line.to_string()))
    }

    /// Make the connected link fail with the given error.
    pub fn fail(&self, error: AcquisitionError) -> bool {
        self.push(FeedItem::Fail(error))
    }

    /// End the input of the connected link.
    pub fn end(&self) -> bool {
        self.push(FeedItem::End)
    }

    /// Make future connects and link checks fail (`Some`) or succeed (`None`).
    pub fn refuse_connections(&self, error: Option<AcquisitionError>) {
        self.shared.lock().refuse = error;
    }

    /// Returns true while a link is connected and still receiving.
    pub fn is_connected(&self) -> bool {
        self.shared
            .lock()
            .current
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Number of successful connects so far.
    pub fn connections(&self) -> usize {
        self.shared.lock().connections
    }

    fn push(&self, item: FeedItem) -> bool {
        match self.shared.lock().current.as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

struct ChannelLink {
    receiver: mpsc::UnboundedReceiver<FeedItem>,
    description: String,
    sequence: u64,
}

#[async_trait]
impl TelemetryLink for ChannelLink {
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, AcquisitionError> {
        match self.receiver.recv().await {
            Some(FeedItem::Record(line)) => {
                self.sequence += 1;
                Ok(Some(TelemetryRecord::new(self.sequence, line)))
            }
            Some(FeedItem::Fail(err)) => Err(err),
            // Dropping every feed handle ends the input as well
            Some(FeedItem::End) | None => Ok(None),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}
