//! Background acquisition worker.
//!
//! A worker connects to its input, then forwards records to the control
//! thread until it is cancelled, the input ends, or the input fails. All
//! traffic back to the controller goes through an mpsc channel; the worker
//! never touches controller state.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::AcquisitionError;
use crate::source::{DeviceConnector, TelemetryRecord};

/// How a worker ended. Exactly one is reported per worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Cancellation was requested and observed.
    Stopped,
    /// The input was exhausted (end of a replayed log).
    Completed,
    /// Acquisition failed.
    Failed(AcquisitionError),
}

/// Events posted from a worker to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The input is connected and records will follow.
    Started { description: String },
    Record(TelemetryRecord),
    /// Always the last event of a worker.
    Finished(WorkerOutcome),
}

/// A worker event tagged with the generation of the worker that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMessage {
    pub generation: u64,
    pub event: WorkerEvent,
}

/// Handle to a running acquisition task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct AcquisitionWorker {
    generation: u64,
    description: String,
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl AcquisitionWorker {
    /// Spawn a worker for `connector` on the given runtime.
    ///
    /// Returns immediately; progress is reported through `events`.
    pub fn spawn(
        runtime: &Handle,
        generation: u64,
        connector: Arc<dyn DeviceConnector>,
        events: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let description = connector.description().to_string();

        let join = runtime.spawn(async move {
            let outcome = acquire(connector, cancel_rx, &events, generation).await;
            let _ = events.send(WorkerMessage {
                generation,
                event: WorkerEvent::Finished(outcome),
            });
        });

        Self {
            generation,
            description,
            cancel_tx,
            join,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Description of the input this worker is bound to.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Drop the task at its next await point without waiting for it.
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Resolves once cancellation was requested or the handle was dropped.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        let requested = *cancel_rx.borrow_and_update();
        if requested {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn acquire(
    connector: Arc<dyn DeviceConnector>,
    mut cancel_rx: watch::Receiver<bool>,
    events: &mpsc::UnboundedSender<WorkerMessage>,
    generation: u64,
) -> WorkerOutcome {
    let post = |event: WorkerEvent| {
        let _ = events.send(WorkerMessage { generation, event });
    };

    let connected = tokio::select! {
        biased;
        _ = cancelled(&mut cancel_rx) => return WorkerOutcome::Stopped,
        result = connector.connect() => result,
    };
    let mut link = match connected {
        Ok(link) => link,
        Err(err) => return WorkerOutcome::Failed(err),
    };

    tracing::info!(generation, input = link.description(), "acquisition started");
    post(WorkerEvent::Started {
        description: link.description().to_string(),
    });

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => return WorkerOutcome::Stopped,
            result = link.next_record() => match result {
                Ok(Some(record)) => post(WorkerEvent::Record(record)),
                Ok(None) => return WorkerOutcome::Completed,
                Err(err) => return WorkerOutcome::Failed(err),
            },
        }
    }
}
