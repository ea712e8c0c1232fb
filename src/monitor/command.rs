//! Commands issued by the trigger layer and their validity per state.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use super::session::{MonitoringSession, MonitoringState, SourceMode};
use crate::error::MonitorError;

/// The fixed set of commands the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CommandKind {
    Start,
    StartWithSimulation,
    Halt,
    Restart,
    TestConnection,
    OpenLog,
    CloseLog,
}

const RESTING: &[MonitoringState] = &[
    MonitoringState::Idle,
    MonitoringState::Halted,
    MonitoringState::Error,
];
const ACTIVE: &[MonitoringState] = &[MonitoringState::Starting, MonitoringState::Running];

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Start,
        CommandKind::StartWithSimulation,
        CommandKind::Halt,
        CommandKind::Restart,
        CommandKind::TestConnection,
        CommandKind::OpenLog,
        CommandKind::CloseLog,
    ];

    /// Stable identifier used by external trigger layers.
    pub fn id(self) -> &'static str {
        match self {
            CommandKind::Start => "OBD_START",
            CommandKind::StartWithSimulation => "OBD_START_WITH_LOG",
            CommandKind::Halt => "OBD_HALT",
            CommandKind::Restart => "OBD_RESTART",
            CommandKind::TestConnection => "OBD_TEST",
            CommandKind::OpenLog => "FILE_OPEN",
            CommandKind::CloseLog => "FILE_CLOSE",
        }
    }

    /// Returns the display label for this command.
    pub fn label(self) -> &'static str {
        match self {
            CommandKind::Start => "Start",
            CommandKind::StartWithSimulation => "Start with log",
            CommandKind::Halt => "Halt",
            CommandKind::Restart => "Restart",
            CommandKind::TestConnection => "Test connection",
            CommandKind::OpenLog => "Open log",
            CommandKind::CloseLog => "Close log",
        }
    }

    /// States in which the dispatcher executes this command.
    pub fn valid_states(self) -> &'static [MonitoringState] {
        match self {
            CommandKind::Halt | CommandKind::Restart => ACTIVE,
            CommandKind::Start
            | CommandKind::StartWithSimulation
            | CommandKind::TestConnection
            | CommandKind::OpenLog
            | CommandKind::CloseLog => RESTING,
        }
    }

    pub fn is_valid_in(self, state: MonitoringState) -> bool {
        self.valid_states().contains(&state)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CommandKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MonitorError::UnknownCommand(s.to_string()))
    }
}

/// A command with its optional path payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub payload: Option<PathBuf>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    pub fn with_path(kind: CommandKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            payload: Some(path.into()),
        }
    }

    /// Build a command from its identifier.
    pub fn parse(id: &str, payload: Option<PathBuf>) -> Result<Self, MonitorError> {
        Ok(Self {
            kind: id.parse()?,
            payload,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.payload.as_deref()
    }
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        Command::new(kind)
    }
}

/// Commands the trigger layer should offer for the given session.
///
/// Starts from the validity table and applies the simulation rules: an
/// armed log disables "start with log" and enables "close log".
pub fn enabled_commands(session: &MonitoringSession) -> BTreeSet<CommandKind> {
    let simulated = session.source_mode() == SourceMode::Simulated;
    CommandKind::ALL
        .into_iter()
        .filter(|kind| kind.is_valid_in(session.state()))
        .filter(|kind| match kind {
            CommandKind::StartWithSimulation => !simulated,
            CommandKind::CloseLog => simulated,
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.id().parse::<CommandKind>().unwrap(), kind);
        }
        assert_eq!("obd_halt".parse::<CommandKind>().unwrap(), CommandKind::Halt);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            "FILE_SAVE".parse::<CommandKind>(),
            Err(MonitorError::UnknownCommand("FILE_SAVE".to_string()))
        );
        assert!(Command::parse("HELP_ABOUT", None).is_err());
    }

    #[test]
    fn test_halt_only_while_active() {
        assert!(CommandKind::Halt.is_valid_in(MonitoringState::Running));
        assert!(CommandKind::Halt.is_valid_in(MonitoringState::Starting));
        assert!(!CommandKind::Halt.is_valid_in(MonitoringState::Stopping));
        assert!(!CommandKind::Halt.is_valid_in(MonitoringState::Halted));
    }

    #[test]
    fn test_nothing_valid_while_stopping() {
        for kind in CommandKind::ALL {
            assert!(!kind.is_valid_in(MonitoringState::Stopping), "{kind}");
        }
    }

    #[test]
    fn test_enabled_commands_idle() {
        let session = MonitoringSession::new();
        let enabled = enabled_commands(&session);
        assert!(enabled.contains(&CommandKind::Start));
        assert!(enabled.contains(&CommandKind::StartWithSimulation));
        assert!(enabled.contains(&CommandKind::TestConnection));
        assert!(enabled.contains(&CommandKind::OpenLog));
        assert!(!enabled.contains(&CommandKind::Halt));
        assert!(!enabled.contains(&CommandKind::CloseLog));
    }

    #[test]
    fn test_enabled_commands_with_armed_log() {
        let mut session = MonitoringSession::new();
        session.arm_simulation(PathBuf::from("trace.log"));

        let enabled = enabled_commands(&session);
        assert!(!enabled.contains(&CommandKind::StartWithSimulation));
        assert!(enabled.contains(&CommandKind::CloseLog));
        assert!(enabled.contains(&CommandKind::Start));
    }

    #[test]
    fn test_enabled_commands_running() {
        let mut session = MonitoringSession::new();
        session.transition(MonitoringState::Starting);
        session.transition(MonitoringState::Running);

        let enabled = enabled_commands(&session);
        assert_eq!(
            enabled.into_iter().collect::<Vec<_>>(),
            vec![CommandKind::Halt, CommandKind::Restart]
        );
    }

    #[test]
    fn test_restart_only_while_active() {
        assert_eq!("OBD_RESTART".parse::<CommandKind>().unwrap(), CommandKind::Restart);
        assert!(CommandKind::Restart.is_valid_in(MonitoringState::Starting));
        assert!(CommandKind::Restart.is_valid_in(MonitoringState::Running));
        for state in [
            MonitoringState::Idle,
            MonitoringState::Stopping,
            MonitoringState::Halted,
            MonitoringState::Error,
        ] {
            assert!(!CommandKind::Restart.is_valid_in(state), "{state}");
        }
    }
}
