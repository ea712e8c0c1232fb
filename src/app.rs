//! Application state for the terminal front end.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::monitor::{
    Command, CommandDispatcher, CommandKind, DispatchOutcome, MonitorController,
};
use crate::notify::Notification;
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(4);

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    pub controller: MonitorController,
    dispatcher: CommandDispatcher,
    notifications: mpsc::UnboundedReceiver<Notification>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app around a controller.
    ///
    /// `notifications` is the receiving end of the notifier the controller
    /// was built with.
    pub fn new(
        controller: MonitorController,
        dispatcher: CommandDispatcher,
        notifications: mpsc::UnboundedReceiver<Notification>,
        theme: Theme,
    ) -> Self {
        Self {
            running: true,
            show_help: false,
            controller,
            dispatcher,
            notifications,
            theme,
            status_message: None,
        }
    }

    /// Returns a description of the current acquisition input.
    pub fn source_description(&self) -> &str {
        self.controller.source_description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Apply worker events and surface queued notifications.
    ///
    /// Called once per iteration of the main loop.
    pub fn tick(&mut self) {
        self.controller.process_events();
        while let Ok(notification) = self.notifications.try_recv() {
            self.set_status_message(notification.summary());
        }
    }

    /// Whether the trigger for `kind` should be offered.
    pub fn is_enabled(&self, kind: CommandKind) -> bool {
        self.controller.enabled_commands().contains(&kind)
    }

    /// Fire the trigger bound to `kind`.
    ///
    /// Disabled triggers do nothing apart from a status hint.
    pub fn trigger(&mut self, kind: CommandKind) {
        if !self.is_enabled(kind) {
            self.set_status_message(format!(
                "{} is not available while {}",
                kind.label(),
                self.controller.state()
            ));
            return;
        }

        match self.dispatcher.dispatch(&mut self.controller, Command::new(kind)) {
            // The result follows as a notification
            DispatchOutcome::Executed(CommandKind::TestConnection) => {
                self.set_status_message(format!(
                    "Testing connection to {}...",
                    self.controller.source_description()
                ));
            }
            DispatchOutcome::Executed(kind) => {
                self.set_status_message(format!("{}: {}", kind.label(), self.source_description()));
            }
            DispatchOutcome::Rejected { error, .. } if error.is_state_conflict() => {
                self.set_status_message(error.to_string());
            }
            DispatchOutcome::Rejected { .. }
            | DispatchOutcome::Ignored { .. }
            | DispatchOutcome::Unknown(_) => {}
        }
        // Pick up notifications raised by the command right away
        self.tick();
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Halt monitoring and leave the main loop.
    pub fn quit(&mut self) {
        let _ = self.controller.halt();
        self.running = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::monitor::controller::tests::{write_log, Harness};
    use crate::monitor::MonitoringState;
    use crate::source::ChannelFeed;
    use tokio::runtime::Runtime;

    pub(crate) struct TestApp {
        pub app: App,
        pub feed: ChannelFeed,
        // Dropped last so workers can finish
        pub _runtime: Runtime,
    }

    pub(crate) fn test_app(default_log: Option<std::path::PathBuf>) -> TestApp {
        let Harness {
            controller,
            feed,
            notifications,
            runtime,
        } = Harness::new();
        let dispatcher = CommandDispatcher::new().with_default_log(default_log);
        let app = App::new(controller, dispatcher, notifications, Theme::dark());
        TestApp {
            app,
            feed,
            _runtime: runtime,
        }
    }

    fn tick_until(app: &mut App, state: MonitoringState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.controller.state() != state {
            assert!(Instant::now() < deadline, "timed out waiting for {state}");
            std::thread::sleep(Duration::from_millis(5));
            app.tick();
        }
    }

    #[test]
    fn test_start_and_halt_triggers() {
        let mut t = test_app(None);
        assert!(t.app.is_enabled(CommandKind::Start));
        assert!(!t.app.is_enabled(CommandKind::Halt));

        t.app.trigger(CommandKind::Start);
        tick_until(&mut t.app, MonitoringState::Running);
        assert!(!t.app.is_enabled(CommandKind::Start));
        assert!(t.app.is_enabled(CommandKind::Halt));
        assert_eq!(t.app.get_status_message(), Some("Start: channel: test"));

        t.app.trigger(CommandKind::Halt);
        tick_until(&mut t.app, MonitoringState::Halted);
        assert_eq!(t.feed.connections(), 1);
    }

    #[test]
    fn test_disabled_trigger_only_hints() {
        let mut t = test_app(None);
        t.app.trigger(CommandKind::Halt);

        assert_eq!(t.app.controller.state(), MonitoringState::Idle);
        assert_eq!(
            t.app.get_status_message(),
            Some("Halt is not available while Idle")
        );
    }

    #[test]
    fn test_failure_notification_reaches_status_line() {
        let mut t = test_app(None);
        t.app.trigger(CommandKind::Start);
        tick_until(&mut t.app, MonitoringState::Running);

        t.feed.fail(crate::error::AcquisitionError::Disconnected);
        tick_until(&mut t.app, MonitoringState::Halted);
        assert_eq!(
            t.app.get_status_message(),
            Some("Error: Acquisition failed: Device disconnected")
        );
        assert!(t.app.is_enabled(CommandKind::Start));
    }

    #[test]
    fn test_open_log_uses_default_log() {
        let log = write_log("41 0C 1A F8\n");
        let mut t = test_app(Some(log.path().to_path_buf()));

        t.app.trigger(CommandKind::OpenLog);
        assert!(t.app.is_enabled(CommandKind::CloseLog));
        assert!(!t.app.is_enabled(CommandKind::StartWithSimulation));
        assert!(t.app.source_description().starts_with("log: "));

        t.app.trigger(CommandKind::CloseLog);
        assert!(!t.app.is_enabled(CommandKind::CloseLog));
    }

    #[test]
    fn test_connection_test_result_is_shown() {
        let mut t = test_app(None);
        t.app.trigger(CommandKind::TestConnection);

        let deadline = Instant::now() + Duration::from_secs(5);
        while t.app.get_status_message() != Some("Connection test: channel: test ready") {
            assert!(
                Instant::now() < deadline,
                "status stayed at {:?}",
                t.app.get_status_message()
            );
            std::thread::sleep(Duration::from_millis(5));
            t.app.tick();
        }
        assert_eq!(t.app.controller.state(), MonitoringState::Idle);
    }

    #[test]
    fn test_restart_trigger_starts_a_new_run() {
        let mut t = test_app(None);
        t.app.trigger(CommandKind::Start);
        tick_until(&mut t.app, MonitoringState::Running);
        assert!(t.app.is_enabled(CommandKind::Restart));

        t.app.trigger(CommandKind::Restart);
        assert_eq!(t.app.get_status_message(), Some("Restart: channel: test"));
        let deadline = Instant::now() + Duration::from_secs(5);
        while t.app.controller.session().restart_count() < 2 {
            assert!(Instant::now() < deadline, "restart never happened");
            std::thread::sleep(Duration::from_millis(5));
            t.app.tick();
        }
        tick_until(&mut t.app, MonitoringState::Running);
        assert_eq!(t.feed.connections(), 2);
    }

    #[test]
    fn test_quit_halts_monitoring() {
        let mut t = test_app(None);
        t.app.trigger(CommandKind::Start);
        t.app.quit();

        assert!(!t.app.running);
        assert_eq!(t.app.controller.state(), MonitoringState::Stopping);
    }
}
