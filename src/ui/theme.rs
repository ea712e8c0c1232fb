//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::monitor::MonitoringState;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color while monitoring is starting or stopping.
    pub transitional: Color,
    /// Color after a failure.
    pub critical: Color,
    /// Color while monitoring is running.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for headings.
    pub header: Style,
    /// Style for commands that can be triggered.
    pub command_enabled: Style,
    /// Style for greyed-out commands.
    pub command_disabled: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            transitional: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            command_enabled: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            command_disabled: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            transitional: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            command_enabled: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            command_disabled: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a session state
    pub fn state_style(&self, state: MonitoringState) -> Style {
        match state {
            MonitoringState::Running => Style::default().fg(self.healthy),
            MonitoringState::Starting | MonitoringState::Stopping => {
                Style::default().fg(self.transitional)
            }
            MonitoringState::Error => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
            MonitoringState::Idle | MonitoringState::Halted => Style::default(),
        }
    }

    /// Style for a command in the command bar.
    pub fn command_style(&self, enabled: bool) -> Style {
        if enabled {
            self.command_enabled
        } else {
            self.command_disabled
        }
    }
}
