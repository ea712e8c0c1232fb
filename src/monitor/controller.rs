//! The monitoring lifecycle controller.
//!
//! One controller owns the session, the watchdog status, the optional
//! simulation log and at most one acquisition worker. It lives on the
//! control thread: every mutation happens through `&mut self`, and worker
//! progress only arrives through [`MonitorController::process_events`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::command::{enabled_commands, CommandKind};
use super::session::{MonitoringSession, MonitoringState, SourceMode};
use super::watchdog::WatchdogState;
use super::worker::{AcquisitionWorker, WorkerEvent, WorkerMessage, WorkerOutcome};
use crate::config::MonitorConfig;
use crate::data::RecordHistory;
use crate::error::{AcquisitionError, MonitorError, MonitorResult};
use crate::notify::Notifier;
use crate::source::{DeviceConnector, SimulationSource};

/// Timing and lookup settings of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Pause between replayed log records.
    pub replay_interval: Duration,
    /// How long a stopping worker may take before it is aborted.
    pub stop_timeout: Duration,
    /// Upper bound for a connection test.
    pub test_timeout: Duration,
    /// Where relative log paths are looked up. Created if missing.
    pub log_directory: Option<PathBuf>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for ControllerSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            replay_interval: config.replay.interval,
            stop_timeout: config.stop_timeout,
            test_timeout: config.test_timeout,
            log_directory: config.log_directory.clone(),
        }
    }
}

type LinkCheck = Result<String, AcquisitionError>;

/// Owns a [`MonitoringSession`] and drives acquisition workers.
pub struct MonitorController {
    session: MonitoringSession,
    status_tx: watch::Sender<WatchdogState>,
    simulation: Option<SimulationSource>,
    worker: Option<AcquisitionWorker>,
    next_generation: u64,
    events_tx: mpsc::UnboundedSender<WorkerMessage>,
    events_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    link_checks_tx: mpsc::UnboundedSender<LinkCheck>,
    link_checks_rx: mpsc::UnboundedReceiver<LinkCheck>,
    checking_link: bool,
    pending_restart: bool,
    runtime: Handle,
    device: Arc<dyn DeviceConnector>,
    notifier: Box<dyn Notifier>,
    settings: ControllerSettings,
    stopping_since: Option<Instant>,
    history: RecordHistory,
}

impl MonitorController {
    /// Create a controller.
    ///
    /// `runtime` runs the acquisition workers and connection tests. It must
    /// be a multi-thread runtime: the controller never blocks on it, so a
    /// `current_thread` runtime would only make progress while some other
    /// thread drives it. The controller itself is used from a thread outside
    /// that runtime. `device` is the live input used whenever no simulation
    /// log is open.
    pub fn new(
        runtime: Handle,
        device: Arc<dyn DeviceConnector>,
        notifier: Box<dyn Notifier>,
        settings: ControllerSettings,
    ) -> Self {
        if let Some(dir) = &settings.log_directory {
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!(%err, dir = %dir.display(), "could not create log directory");
            }
        }

        let (status_tx, _) = watch::channel(WatchdogState::unknown());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (link_checks_tx, link_checks_rx) = mpsc::unbounded_channel();
        Self {
            session: MonitoringSession::new(),
            status_tx,
            simulation: None,
            worker: None,
            next_generation: 0,
            events_tx,
            events_rx,
            link_checks_tx,
            link_checks_rx,
            checking_link: false,
            pending_restart: false,
            runtime,
            device,
            notifier,
            settings,
            stopping_since: None,
            history: RecordHistory::new(),
        }
    }

    pub fn session(&self) -> &MonitoringSession {
        &self.session
    }

    pub fn state(&self) -> MonitoringState {
        self.session.state()
    }

    /// Current watchdog status.
    pub fn watchdog(&self) -> WatchdogState {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to watchdog changes.
    pub fn subscribe_status(&self) -> watch::Receiver<WatchdogState> {
        self.status_tx.subscribe()
    }

    /// Commands the trigger layer should currently offer.
    pub fn enabled_commands(&self) -> BTreeSet<CommandKind> {
        enabled_commands(&self.session)
    }

    /// The open simulation log, if any.
    pub fn simulation(&self) -> Option<&SimulationSource> {
        self.simulation.as_ref()
    }

    /// Recent records of the current run.
    pub fn history(&self) -> &RecordHistory {
        &self.history
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Description of the input the next (or current) run uses.
    pub fn source_description(&self) -> &str {
        match (&self.worker, &self.simulation) {
            (Some(worker), _) => worker.description(),
            (None, Some(simulation)) => simulation.description(),
            (None, None) => self.device.description(),
        }
    }

    /// Forward an error to the notifier.
    pub fn report_error(&self, error: &MonitorError) {
        self.notifier.report_error(error);
    }

    /// Start monitoring.
    ///
    /// Binds the worker to the open simulation log if there is one, otherwise
    /// to the live device. With `use_simulation` a log must be open. Returns
    /// as soon as the worker is spawned.
    pub fn start(&mut self, use_simulation: bool) -> MonitorResult<()> {
        match self.session.state {
            MonitoringState::Starting | MonitoringState::Running => {
                return Err(MonitorError::AlreadyRunning)
            }
            MonitoringState::Stopping => return Err(MonitorError::AlreadyStopping),
            MonitoringState::Idle | MonitoringState::Halted | MonitoringState::Error => {}
        }

        let connector = match &self.simulation {
            Some(simulation) => simulation.connector(),
            None if use_simulation => {
                let err = MonitorError::source_unavailable(
                    PathBuf::new(),
                    "no simulation log is open",
                );
                self.notifier.report_error(&err);
                return Err(err);
            }
            None => Arc::clone(&self.device),
        };

        self.session.restart_count += 1;
        self.session.records_received = 0;
        self.session.last_error = None;
        self.history.clear();
        self.session.transition(MonitoringState::Starting);
        self.set_watchdog(WatchdogState::working(self.session.restart_count));

        self.next_generation += 1;
        let worker = AcquisitionWorker::spawn(
            &self.runtime,
            self.next_generation,
            connector,
            self.events_tx.clone(),
        );
        info!(
            generation = worker.generation(),
            restart_count = self.session.restart_count,
            input = worker.description(),
            "monitoring started"
        );
        self.worker = Some(worker);
        Ok(())
    }

    /// Open `path` (or reuse the open log) and start monitoring from it.
    ///
    /// While a run on the open log is already in progress this is a no-op
    /// returning the open log's path.
    pub fn start_with_simulation(&mut self, path: &Path) -> MonitorResult<PathBuf> {
        match self.session.state {
            MonitoringState::Stopping => return Err(MonitorError::AlreadyStopping),
            MonitoringState::Starting | MonitoringState::Running => {
                return match &self.simulation {
                    Some(simulation) => {
                        debug!(path = %simulation.path().display(), "simulation already running");
                        Ok(simulation.path().to_path_buf())
                    }
                    None => Err(MonitorError::AlreadyRunning),
                };
            }
            _ => {}
        }

        let opened = self.open_log(path)?;
        self.start(true)?;
        Ok(opened)
    }

    /// Stop monitoring.
    ///
    /// Idempotent: nothing happens when no worker is alive or a stop is
    /// already in flight. The watchdog switches to halted right away; the
    /// session reaches `Halted` once the worker reports back.
    pub fn halt(&mut self) -> MonitorResult<()> {
        if std::mem::take(&mut self.pending_restart) {
            info!("pending restart cancelled");
        }
        match self.session.state {
            MonitoringState::Stopping => return Ok(()),
            MonitoringState::Idle | MonitoringState::Halted if self.worker.is_none() => {
                return Ok(())
            }
            _ => {}
        }
        self.request_stop(WatchdogState::halted());
        Ok(())
    }

    /// Stop the current run and start a new one on the same input.
    ///
    /// With a worker alive the new run starts once the old one has reported
    /// back or was aborted after the stop timeout. Without a worker this is a
    /// plain [`start`](Self::start).
    pub fn restart(&mut self) -> MonitorResult<()> {
        if self.session.state == MonitoringState::Stopping {
            return Err(MonitorError::AlreadyStopping);
        }
        if self.worker.is_none() {
            return self.start(false);
        }

        info!(restart_count = self.session.restart_count, "restart requested");
        self.request_stop(WatchdogState::halted());
        self.pending_restart = true;
        Ok(())
    }

    fn resume_pending_restart(&mut self) {
        if !std::mem::take(&mut self.pending_restart) {
            return;
        }
        if let Err(err) = self.start(false) {
            warn!(%err, "restart failed");
        }
    }

    fn request_stop(&mut self, watchdog: WatchdogState) {
        self.set_watchdog(watchdog);
        match &self.worker {
            Some(worker) => {
                worker.cancel();
                info!(generation = worker.generation(), "stop requested");
                self.session.transition(MonitoringState::Stopping);
                self.stopping_since = Some(Instant::now());
            }
            None => {
                self.session.transition(MonitoringState::Halted);
            }
        }
    }

    /// Open a simulation log.
    ///
    /// Only one log can be open; opening again returns the open log's path
    /// unchanged.
    pub fn open_log(&mut self, path: &Path) -> MonitorResult<PathBuf> {
        if let Some(simulation) = &self.simulation {
            debug!(path = %simulation.path().display(), "simulation log already open");
            return Ok(simulation.path().to_path_buf());
        }
        if self.session.state.is_active() {
            return Err(MonitorError::AlreadyRunning);
        }

        let source = match SimulationSource::open(
            path,
            self.settings.log_directory.as_deref(),
            self.settings.replay_interval,
        ) {
            Ok(source) => source,
            Err(err) => {
                warn!(%err, "could not open simulation log");
                self.notifier.report_error(&err);
                return Err(err);
            }
        };

        let opened = source.path().to_path_buf();
        info!(
            path = %opened.display(),
            records = source.record_count(),
            "simulation log opened"
        );
        self.session.arm_simulation(opened.clone());
        self.simulation = Some(source);
        Ok(opened)
    }

    /// Close the simulation log. Idempotent.
    pub fn close_log(&mut self) -> MonitorResult<()> {
        if self.session.state.is_active() && self.session.source_mode == SourceMode::Simulated {
            return Err(MonitorError::AlreadyRunning);
        }
        if let Some(source) = self.simulation.take() {
            source.close();
            self.session.disarm_simulation();
            info!("simulation log closed");
        }
        Ok(())
    }

    /// Check that the live device is reachable without starting a run.
    ///
    /// Returns right away. The check runs on the runtime, bounded by the
    /// configured test timeout, and its result reaches the notifier from
    /// [`process_events`](Self::process_events). A request while a check is
    /// still pending is folded into that check.
    pub fn test_connection(&mut self) -> MonitorResult<()> {
        match self.session.state {
            MonitoringState::Starting | MonitoringState::Running => {
                return Err(MonitorError::AlreadyRunning)
            }
            MonitoringState::Stopping => return Err(MonitorError::AlreadyStopping),
            _ => {}
        }
        if self.checking_link {
            debug!("connection test already pending");
            return Ok(());
        }

        let device = Arc::clone(&self.device);
        let timeout = self.settings.test_timeout;
        let results = self.link_checks_tx.clone();
        self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, device.check_link()).await {
                Ok(result) => result,
                Err(_) => Err(AcquisitionError::Timeout(timeout)),
            };
            let _ = results.send(result);
        });
        self.checking_link = true;
        info!(input = self.device.description(), "connection test started");
        Ok(())
    }

    fn finish_link_check(&mut self, result: LinkCheck) {
        self.checking_link = false;
        match result {
            Ok(info) => {
                info!(%info, "connection test passed");
                self.notifier.notify("Connection test", &info);
            }
            Err(err) => {
                let err = MonitorError::AcquisitionFailure(err);
                warn!(%err, "connection test failed");
                self.notifier.report_error(&err);
            }
        }
    }

    /// Apply all pending worker events in arrival order.
    ///
    /// Never blocks. Also delivers finished connection tests and aborts a
    /// worker that ignores cancellation for longer than the stop timeout.
    /// Returns the number of events applied.
    pub fn process_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(message) = self.events_rx.try_recv() {
            processed += 1;
            self.handle_message(message);
        }
        while let Ok(result) = self.link_checks_rx.try_recv() {
            processed += 1;
            self.finish_link_check(result);
        }
        self.check_stop_timeout();
        processed
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        let current = self.worker.as_ref().map(AcquisitionWorker::generation);
        if current != Some(message.generation) {
            debug!(generation = message.generation, "discarding event of a retired worker");
            return;
        }

        match message.event {
            WorkerEvent::Started { description } => {
                if self.session.state == MonitoringState::Starting {
                    self.session.transition(MonitoringState::Running);
                    info!(input = %description, "monitoring running");
                }
            }
            WorkerEvent::Record(record) => {
                self.session.records_received += 1;
                self.history.record(record);
            }
            WorkerEvent::Finished(outcome) => self.finish_worker(outcome),
        }
    }

    fn finish_worker(&mut self, outcome: WorkerOutcome) {
        self.worker = None;
        self.stopping_since = None;

        match outcome {
            WorkerOutcome::Stopped | WorkerOutcome::Completed => {
                info!(
                    ?outcome,
                    records = self.session.records_received,
                    "monitoring halted"
                );
                if self.session.state != MonitoringState::Stopping {
                    self.set_watchdog(WatchdogState::halted());
                }
                self.session.transition(MonitoringState::Halted);
                self.resume_pending_restart();
            }
            WorkerOutcome::Failed(err) => {
                error!(%err, "acquisition failed");
                let reason = err.to_string();
                if matches!(
                    self.session.state,
                    MonitoringState::Starting | MonitoringState::Running
                ) {
                    self.session.transition(MonitoringState::Error);
                }
                self.session.last_error = Some(reason.clone());
                if std::mem::take(&mut self.pending_restart) {
                    info!("pending restart dropped after failure");
                }
                self.notifier
                    .report_error(&MonitorError::AcquisitionFailure(err));
                self.request_stop(WatchdogState::failed(&reason));
            }
        }
    }

    fn check_stop_timeout(&mut self) {
        let Some(since) = self.stopping_since else {
            return;
        };
        if since.elapsed() < self.settings.stop_timeout {
            return;
        }

        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                debug!(generation = worker.generation(), "worker exited without reporting");
            } else {
                warn!(
                    generation = worker.generation(),
                    timeout = ?self.settings.stop_timeout,
                    "worker ignored cancellation, aborting"
                );
                worker.abort();
            }
        }
        self.stopping_since = None;
        self.session.transition(MonitoringState::Halted);
        self.resume_pending_restart();
    }

    fn set_watchdog(&self, state: WatchdogState) {
        debug!(symbol = %state.symbol, label = %state.label, "watchdog");
        self.status_tx.send_replace(state);
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: MonitoringState) {
        self.session.state = state;
    }
}

impl std::fmt::Debug for MonitorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorController")
            .field("session", &self.session)
            .field("watchdog", &*self.status_tx.borrow())
            .field("device", &self.device)
            .field("generation", &self.next_generation)
            .field("pending_restart", &self.pending_restart)
            .finish()
    }
}
