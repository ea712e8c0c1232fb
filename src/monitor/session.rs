//! The monitoring session and its state machine.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Lifecycle state of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MonitoringState {
    /// Nothing has been started yet.
    Idle,
    /// A worker was spawned and is connecting to its input.
    Starting,
    /// The worker is delivering telemetry.
    Running,
    /// Cancellation was requested; the worker has not finished yet.
    Stopping,
    /// Resting state after a stop, an end of input or a failure.
    Halted,
    /// A failure is being handled; always followed by `Halted`.
    Error,
}

impl MonitoringState {
    /// Returns true while a worker may be alive.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            MonitoringState::Starting | MonitoringState::Running | MonitoringState::Stopping
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: MonitoringState) -> bool {
        use MonitoringState::*;
        matches!(
            (self, next),
            (Idle | Halted | Error, Starting)
                | (Starting, Running | Stopping | Error)
                | (Running, Stopping | Error | Halted)
                | (Stopping, Halted)
                | (Error, Halted)
        )
    }

    /// Returns the display label for this state.
    pub fn label(self) -> &'static str {
        match self {
            MonitoringState::Idle => "Idle",
            MonitoringState::Starting => "Starting",
            MonitoringState::Running => "Running",
            MonitoringState::Stopping => "Stopping",
            MonitoringState::Halted => "Halted",
            MonitoringState::Error => "Error",
        }
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where telemetry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceMode {
    Live,
    Simulated,
}

/// The single session owned by a controller.
///
/// `log_file` is set exactly when `source_mode` is [`SourceMode::Simulated`];
/// the arming helpers keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringSession {
    pub(crate) state: MonitoringState,
    pub(crate) source_mode: SourceMode,
    pub(crate) restart_count: u32,
    pub(crate) log_file: Option<PathBuf>,
    pub(crate) records_received: u64,
    pub(crate) last_error: Option<String>,
}

impl Default for MonitoringSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringSession {
    pub fn new() -> Self {
        Self {
            state: MonitoringState::Idle,
            source_mode: SourceMode::Live,
            restart_count: 0,
            log_file: None,
            records_received: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> MonitoringState {
        self.state
    }

    pub fn source_mode(&self) -> SourceMode {
        self.source_mode
    }

    /// How many times monitoring was started in this process.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Records received from the current (or last) worker.
    pub fn records_received(&self) -> u64 {
        self.records_received
    }

    /// Message of the most recent acquisition failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Returns false and leaves the state untouched otherwise.
    pub(crate) fn transition(&mut self, next: MonitoringState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "rejected state transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        true
    }

    pub(crate) fn arm_simulation(&mut self, log_file: PathBuf) {
        self.source_mode = SourceMode::Simulated;
        self.log_file = Some(log_file);
    }

    pub(crate) fn disarm_simulation(&mut self) {
        self.source_mode = SourceMode::Live;
        self.log_file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MonitoringState::*;

    const ALL: [MonitoringState; 6] = [Idle, Starting, Running, Stopping, Halted, Error];

    #[test]
    fn test_start_only_from_resting_states() {
        for state in ALL {
            assert_eq!(
                state.can_transition_to(Starting),
                matches!(state, Idle | Halted | Error),
                "{state} -> Starting"
            );
        }
    }

    #[test]
    fn test_stopping_only_ends_in_halted() {
        for next in ALL {
            assert_eq!(Stopping.can_transition_to(next), next == Halted, "Stopping -> {next}");
        }
    }

    #[test]
    fn test_failure_path() {
        assert!(Running.can_transition_to(Error));
        assert!(Error.can_transition_to(Halted));
        assert!(!Error.can_transition_to(Running));
        assert!(!Idle.can_transition_to(Running));
    }

    #[test]
    fn test_transition_rejects_invalid_moves() {
        let mut session = MonitoringSession::new();
        assert!(!session.transition(Running));
        assert_eq!(session.state(), Idle);

        assert!(session.transition(Starting));
        assert!(session.transition(Running));
        assert_eq!(session.state(), Running);
    }

    #[test]
    fn test_arm_and_disarm_simulation() {
        let mut session = MonitoringSession::new();
        assert_eq!(session.source_mode(), SourceMode::Live);
        assert!(session.log_file().is_none());

        session.arm_simulation(PathBuf::from("trace.log"));
        assert_eq!(session.source_mode(), SourceMode::Simulated);
        assert_eq!(session.log_file(), Some(Path::new("trace.log")));

        session.disarm_simulation();
        assert_eq!(session.source_mode(), SourceMode::Live);
        assert!(session.log_file().is_none());
    }
}
