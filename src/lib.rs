//! # obdwatch
//!
//! Monitoring lifecycle controller and terminal dashboard for OBD-II
//! telemetry, read live from a network adapter or replayed from a recorded
//! log.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  trigger layer (app/events/ui, CLI, API)                      │
//! │        │ named commands                                       │
//! │        ▼                                                      │
//! │  ┌────────────┐     ┌──────────────────┐   spawn/cancel       │
//! │  │ dispatcher │────▶│    controller    │──────────────┐       │
//! │  │ (gating)   │     │ session/watchdog │              ▼       │
//! │  └────────────┘     └────────▲─────────┘     ┌──────────────┐ │
//! │                              │ mpsc events   │    worker    │ │
//! │                              └───────────────│ (tokio task) │ │
//! │                                              └──────┬───────┘ │
//! │                                                     ▼         │
//! │             source: TcpDevice | SimulationSource | ChannelDevice
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`monitor`]**: the session state machine, watchdog status,
//!   acquisition worker, [`MonitorController`] and [`CommandDispatcher`]
//! - **[`source`]**: acquisition inputs behind the [`DeviceConnector`] trait
//! - **[`notify`]**: how errors and results reach the user
//! - **[`config`]**: layered configuration (file plus `OBDWATCH_*` variables)
//! - **[`app`]**, **[`events`]**, **[`ui`]**: the terminal front end
//!
//! The controller is owned by a single control thread. Workers run on a
//! tokio runtime and only talk back through a channel that the control
//! thread drains with [`MonitorController::process_events`].
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Live adapter
//! obdwatch --device 192.168.0.10:35000
//!
//! # Replay a recorded log without a terminal UI
//! obdwatch --log trace.log --simulate --headless
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use obdwatch::{
//!     ChannelDevice, CommandDispatcher, ControllerSettings, MonitorController,
//!     MonitoringState, TracingNotifier,
//! };
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let (feed, device) = ChannelDevice::create("can0");
//! let mut controller = MonitorController::new(
//!     runtime.handle().clone(),
//!     Arc::new(device),
//!     Box::new(TracingNotifier),
//!     ControllerSettings::default(),
//! );
//!
//! let dispatcher = CommandDispatcher::new();
//! assert!(dispatcher.dispatch_named(&mut controller, "OBD_START", None).is_executed());
//! assert_eq!(controller.state(), MonitoringState::Starting);
//! assert_eq!(controller.watchdog().label, "Monitoring");
//!
//! controller.halt().unwrap();
//! # drop(feed);
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod monitor;
pub mod notify;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::{DeviceConfig, MonitorConfig, ReplayConfig};
pub use error::{AcquisitionError, MonitorError, MonitorResult};
pub use monitor::{
    enabled_commands, Command, CommandDispatcher, CommandKind, ControllerSettings,
    DispatchOutcome, MonitorController, MonitoringSession, MonitoringState, SourceMode,
    WatchdogState,
};
pub use notify::{Notification, Notifier, QueueNotifier, TracingNotifier};
pub use source::{
    ChannelDevice, ChannelFeed, DeviceConnector, SimulationSource, TcpDevice, TelemetryLink,
    TelemetryRecord,
};
