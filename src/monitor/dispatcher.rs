//! Routes named commands to the controller.
//!
//! Triggers are expected to be greyed out in states where their command is
//! invalid, so a command arriving in the wrong state is only logged.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::command::{Command, CommandKind};
use super::controller::MonitorController;
use super::session::MonitoringState;
use crate::error::{MonitorError, MonitorResult};

/// What happened to a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The controller action ran and succeeded.
    Executed(CommandKind),
    /// The command is not valid in the current state; nothing changed.
    Ignored {
        kind: CommandKind,
        state: MonitoringState,
    },
    /// The controller action ran and returned an error.
    Rejected {
        kind: CommandKind,
        error: MonitorError,
    },
    /// No command has this identifier.
    Unknown(String),
}

impl DispatchOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, DispatchOutcome::Executed(_))
    }
}

/// Validates commands against the session state and invokes the controller.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    default_log: Option<PathBuf>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log used by path-taking commands issued without a path.
    pub fn with_default_log(mut self, path: Option<PathBuf>) -> Self {
        self.default_log = path;
        self
    }

    /// Dispatch a command by identifier, e.g. `"OBD_START"`.
    pub fn dispatch_named(
        &self,
        controller: &mut MonitorController,
        id: &str,
        payload: Option<PathBuf>,
    ) -> DispatchOutcome {
        match Command::parse(id, payload) {
            Ok(command) => self.dispatch(controller, command),
            Err(err) => {
                warn!(%err, "ignoring unknown command");
                DispatchOutcome::Unknown(id.to_string())
            }
        }
    }

    /// Dispatch a command.
    pub fn dispatch(&self, controller: &mut MonitorController, command: Command) -> DispatchOutcome {
        let kind = command.kind;
        let state = controller.state();
        if !kind.is_valid_in(state) {
            debug!(command = %kind, %state, "ignored command");
            return DispatchOutcome::Ignored { kind, state };
        }

        debug!(command = %kind, %state, "dispatching");
        match self.execute(controller, command) {
            Ok(()) => DispatchOutcome::Executed(kind),
            Err(error) => {
                if error.is_state_conflict() {
                    debug!(command = %kind, %error, "command rejected");
                }
                DispatchOutcome::Rejected { kind, error }
            }
        }
    }

    fn execute(&self, controller: &mut MonitorController, command: Command) -> MonitorResult<()> {
        match command.kind {
            CommandKind::Start => controller.start(false),
            CommandKind::Halt => controller.halt(),
            CommandKind::Restart => controller.restart(),
            CommandKind::TestConnection => controller.test_connection(),
            CommandKind::CloseLog => controller.close_log(),
            CommandKind::OpenLog => {
                let path = self.resolve_path(controller, &command)?;
                controller.open_log(&path).map(|_| ())
            }
            CommandKind::StartWithSimulation => {
                let path = self.resolve_path(controller, &command)?;
                controller.start_with_simulation(&path).map(|_| ())
            }
        }
    }

    fn resolve_path(
        &self,
        controller: &MonitorController,
        command: &Command,
    ) -> MonitorResult<PathBuf> {
        if let Some(path) = command.path().or(self.default_log.as_deref()) {
            return Ok(path.to_path_buf());
        }
        // An already open log is reused by both commands
        if let Some(simulation) = controller.simulation() {
            return Ok(simulation.path().to_path_buf());
        }
        let err = MonitorError::source_unavailable(PathBuf::new(), "no log file given");
        controller.report_error(&err);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::controller::tests::{write_log, Harness};
    use crate::monitor::session::SourceMode;
    use crate::monitor::watchdog::WatchdogState;
    use crate::notify::Notification;

    const RESTING: [MonitoringState; 3] = [
        MonitoringState::Idle,
        MonitoringState::Halted,
        MonitoringState::Error,
    ];

    #[test]
    fn test_dispatch_named_start() {
        let mut h = Harness::new();
        let dispatcher = CommandDispatcher::new();

        let outcome = dispatcher.dispatch_named(&mut h.controller, "OBD_START", None);
        assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::Start));
        assert_eq!(h.controller.state(), MonitoringState::Starting);
        assert_eq!(h.controller.session().restart_count(), 1);
        h.pump_until_state(MonitoringState::Running);

        let outcome = dispatcher.dispatch_named(&mut h.controller, "OBD_HALT", None);
        assert!(outcome.is_executed());
        h.pump_until_state(MonitoringState::Halted);
    }

    #[test]
    fn test_unknown_command_is_not_fatal() {
        let mut h = Harness::new();
        let before = h.controller.session().clone();

        let outcome = CommandDispatcher::new().dispatch_named(&mut h.controller, "HELP_ABOUT", None);
        assert_eq!(outcome, DispatchOutcome::Unknown("HELP_ABOUT".to_string()));
        assert_eq!(h.controller.session(), &before);
    }

    #[test]
    fn test_invalid_pairs_mutate_nothing() {
        let dispatcher = CommandDispatcher::new();
        for state in [
            MonitoringState::Idle,
            MonitoringState::Starting,
            MonitoringState::Running,
            MonitoringState::Stopping,
            MonitoringState::Halted,
            MonitoringState::Error,
        ] {
            for kind in CommandKind::ALL {
                if kind.is_valid_in(state) {
                    continue;
                }
                let mut h = Harness::new();
                h.controller.force_state(state);
                let session = h.controller.session().clone();
                let watchdog = h.controller.watchdog();

                let outcome = dispatcher.dispatch(&mut h.controller, Command::new(kind));
                assert_eq!(outcome, DispatchOutcome::Ignored { kind, state });
                assert_eq!(h.controller.session(), &session, "{kind} in {state}");
                assert_eq!(h.controller.watchdog(), watchdog);
                assert!(!h.controller.has_worker());
                assert_eq!(h.feed.connections(), 0);
                assert!(h.drain_notifications().is_empty());
            }
        }
    }

    #[test]
    fn test_start_executes_once_in_each_resting_state() {
        let dispatcher = CommandDispatcher::new();
        for state in RESTING {
            let mut h = Harness::new();
            h.controller.force_state(state);

            let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::Start.into());
            assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::Start));
            assert_eq!(h.controller.session().restart_count(), 1);
            assert_eq!(h.controller.watchdog(), WatchdogState::working(1));

            h.pump_until_state(MonitoringState::Running);
            assert_eq!(h.feed.connections(), 1);
        }
    }

    #[test]
    fn test_halt_executes_in_active_states() {
        let dispatcher = CommandDispatcher::new();
        let mut h = Harness::new();

        dispatcher.dispatch(&mut h.controller, CommandKind::Start.into());
        // Still Starting: halt is valid before the worker connected
        let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::Halt.into());
        assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::Halt));
        assert_eq!(h.controller.watchdog(), WatchdogState::halted());
        h.pump_until_state(MonitoringState::Halted);

        h.start_running();
        let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::Halt.into());
        assert!(outcome.is_executed());
        assert_eq!(h.controller.state(), MonitoringState::Stopping);
        h.pump_until_state(MonitoringState::Halted);
    }

    #[test]
    fn test_test_connection_executes_in_each_resting_state() {
        let dispatcher = CommandDispatcher::new();
        for state in RESTING {
            let mut h = Harness::new();
            h.controller.force_state(state);

            let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::TestConnection.into());
            assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::TestConnection));
            assert_eq!(h.pump_until_notified().len(), 1, "{state}");
            assert_eq!(h.controller.state(), state);
            assert_eq!(h.controller.session().restart_count(), 0);
            assert_eq!(h.feed.connections(), 0);
        }
    }

    #[test]
    fn test_open_log_executes_once_in_each_resting_state() {
        let log = write_log("41 0C 1A F8\n");
        let dispatcher = CommandDispatcher::new();
        for state in RESTING {
            let mut h = Harness::new();
            h.controller.force_state(state);

            let outcome = dispatcher.dispatch(
                &mut h.controller,
                Command::with_path(CommandKind::OpenLog, log.path()),
            );
            assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::OpenLog));
            assert_eq!(h.controller.session().log_file(), Some(log.path()), "{state}");
            assert_eq!(h.controller.state(), state);
            assert!(!h.controller.has_worker());
            assert!(h.drain_notifications().is_empty());
        }
    }

    #[test]
    fn test_close_log_executes_once_in_each_resting_state() {
        let log = write_log("41 0C 1A F8\n");
        let dispatcher = CommandDispatcher::new();
        for state in RESTING {
            let mut h = Harness::new();
            h.controller.open_log(log.path()).unwrap();
            h.controller.force_state(state);

            let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::CloseLog.into());
            assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::CloseLog));
            assert!(h.controller.simulation().is_none(), "{state}");
            assert_eq!(h.controller.session().source_mode(), SourceMode::Live);
            assert_eq!(h.controller.state(), state);
        }
    }

    #[test]
    fn test_start_with_simulation_executes_once_in_each_resting_state() {
        let log = write_log("41 0C 1A F8\n41 0D 32\n");
        let dispatcher = CommandDispatcher::new();
        for state in RESTING {
            let mut h = Harness::new();
            h.controller.force_state(state);

            let outcome = dispatcher.dispatch(
                &mut h.controller,
                Command::with_path(CommandKind::StartWithSimulation, log.path()),
            );
            assert_eq!(
                outcome,
                DispatchOutcome::Executed(CommandKind::StartWithSimulation),
                "{state}"
            );
            assert_eq!(h.controller.session().restart_count(), 1);
            assert_eq!(h.controller.watchdog(), WatchdogState::working(1));

            h.pump_until_state(MonitoringState::Halted);
            assert_eq!(h.controller.session().records_received(), 2);
            assert_eq!(h.feed.connections(), 0);
        }
    }

    #[test]
    fn test_restart_executes_while_running() {
        let dispatcher = CommandDispatcher::new();
        let mut h = Harness::new();
        h.start_running();

        let outcome = dispatcher.dispatch_named(&mut h.controller, "OBD_RESTART", None);
        assert_eq!(outcome, DispatchOutcome::Executed(CommandKind::Restart));
        h.pump_until(|c| c.session().restart_count() == 2);
        h.pump_until_state(MonitoringState::Running);
        assert_eq!(h.feed.connections(), 2);
    }

    #[test]
    fn test_restart_ignored_while_stopping() {
        let dispatcher = CommandDispatcher::new();
        let mut h = Harness::new();
        h.start_running();
        dispatcher.dispatch(&mut h.controller, CommandKind::Halt.into());

        let outcome = dispatcher.dispatch(&mut h.controller, CommandKind::Restart.into());
        assert_eq!(
            outcome,
            DispatchOutcome::Ignored {
                kind: CommandKind::Restart,
                state: MonitoringState::Stopping
            }
        );
        h.pump_until_state(MonitoringState::Halted);
        assert_eq!(h.controller.session().restart_count(), 1);
    }

    #[test]
    fn test_open_and_close_log() {
        let log = write_log("41 0C 1A F8\n");
        let mut h = Harness::new();
        let dispatcher = CommandDispatcher::new();

        let outcome = dispatcher.dispatch(
            &mut h.controller,
            Command::with_path(CommandKind::OpenLog, log.path()),
        );
        assert!(outcome.is_executed());
        assert!(h.controller.simulation().is_some());
        assert!(!h
            .controller
            .enabled_commands()
            .contains(&CommandKind::StartWithSimulation));

        let outcome = dispatcher.dispatch_named(&mut h.controller, "FILE_CLOSE", None);
        assert!(outcome.is_executed());
        assert!(h.controller.simulation().is_none());
    }

    #[test]
    fn test_open_log_falls_back_to_default() {
        let log = write_log("41 0C 1A F8\n");
        let mut h = Harness::new();
        let dispatcher = CommandDispatcher::new().with_default_log(Some(log.path().to_path_buf()));

        let outcome = dispatcher.dispatch_named(&mut h.controller, "FILE_OPEN", None);
        assert!(outcome.is_executed());
        assert_eq!(h.controller.session().log_file(), Some(log.path()));
    }

    #[test]
    fn test_open_log_without_path_reports_source_unavailable() {
        let mut h = Harness::new();
        let before = h.controller.session().clone();

        let outcome = CommandDispatcher::new().dispatch_named(&mut h.controller, "FILE_OPEN", None);
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected {
                kind: CommandKind::OpenLog,
                error: MonitorError::SourceUnavailable { .. }
            }
        ));
        assert_eq!(h.controller.session(), &before);
        assert!(matches!(
            h.drain_notifications().as_slice(),
            [Notification::Error(_)]
        ));
    }

    #[test]
    fn test_start_with_simulation_twice_spawns_one_worker() {
        let log = write_log("41 0C 1A F8\n41 0D 32\n");
        let mut h = Harness::with_settings(crate::monitor::ControllerSettings {
            replay_interval: std::time::Duration::from_millis(200),
            ..Harness::new_settings()
        });
        let dispatcher = CommandDispatcher::new();

        dispatcher.dispatch(
            &mut h.controller,
            Command::with_path(CommandKind::OpenLog, log.path()),
        );
        // The second start arrives while the first is still connecting
        let first = dispatcher.dispatch(
            &mut h.controller,
            Command::with_path(CommandKind::StartWithSimulation, log.path()),
        );
        let second = dispatcher.dispatch(
            &mut h.controller,
            Command::with_path(CommandKind::StartWithSimulation, log.path()),
        );

        assert!(first.is_executed());
        assert_eq!(
            second,
            DispatchOutcome::Ignored {
                kind: CommandKind::StartWithSimulation,
                state: MonitoringState::Starting
            }
        );
        assert_eq!(h.controller.session().restart_count(), 1);
        h.pump_until_state(MonitoringState::Halted);
        assert_eq!(h.controller.session().records_received(), 2);
    }
}
