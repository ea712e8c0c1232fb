//! User-facing notifications.
//!
//! The controller reports acquisition failures, unreadable logs and
//! connection test results through a [`Notifier`]. How they reach the user
//! (a popup, a status line, a log file) is up to the implementation.

use tokio::sync::mpsc;

use crate::error::MonitorError;

/// Receives errors and messages meant for the user.
pub trait Notifier: Send {
    /// An error the user should see.
    fn report_error(&self, error: &MonitorError);

    /// An informational message with a short title.
    fn notify(&self, title: &str, message: &str);
}

/// Notifier that only writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report_error(&self, error: &MonitorError) {
        tracing::error!(%error, "monitoring error");
    }

    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "notification");
    }
}

/// A notification as queued by [`QueueNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error(String),
    Info { title: String, message: String },
}

impl Notification {
    /// One-line rendering for a status bar.
    pub fn summary(&self) -> String {
        match self {
            Notification::Error(message) => format!("Error: {}", message),
            Notification::Info { title, message } => format!("{}: {}", title, message),
        }
    }
}

/// Notifier that queues notifications for the display to pick up.
///
/// Every notification is also written to the tracing log.
#[derive(Debug, Clone)]
pub struct QueueNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl QueueNotifier {
    /// Create a notifier and the receiver the display drains.
    pub fn create() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for QueueNotifier {
    fn report_error(&self, error: &MonitorError) {
        TracingNotifier.report_error(error);
        let _ = self.tx.send(Notification::Error(error.to_string()));
    }

    fn notify(&self, title: &str, message: &str) {
        TracingNotifier.notify(title, message);
        let _ = self.tx.send(Notification::Info {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}
