//! Monitoring lifecycle: session state machine, watchdog status, the
//! acquisition worker, the controller that owns them and the command
//! dispatcher in front of it.

pub mod command;
pub mod controller;
pub mod dispatcher;
pub mod session;
pub mod watchdog;
pub mod worker;

pub use command::{enabled_commands, Command, CommandKind};
pub use controller::{ControllerSettings, MonitorController};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use session::{MonitoringSession, MonitoringState, SourceMode};
pub use watchdog::WatchdogState;
pub use worker::{AcquisitionWorker, WorkerEvent, WorkerMessage, WorkerOutcome};
