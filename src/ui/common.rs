//! Common UI components.
//!
//! This module contains the header bar, command bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::events::key_for_command;
use crate::monitor::CommandKind;

/// Render the header bar with the watchdog status.
///
/// Displays: watchdog symbol and label, session state, restarts, record count.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let controller = &app.controller;
    let session = controller.session();
    let watchdog = controller.watchdog();
    let state_style = app.theme.state_style(session.state());

    let mut spans = vec![
        Span::styled(" OBDWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(
            format!("{} {}", watchdog.symbol.trim_end(), watchdog.label),
            state_style,
        ),
        Span::raw(" │ "),
        Span::styled(session.state().label(), state_style),
        Span::raw(" │ "),
        Span::raw(format!("{} restarts", session.restart_count())),
        Span::raw(" │ "),
        Span::styled(
            format_count(session.records_received()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" records"),
    ];

    if let Some(rate) = controller.history().rate() {
        spans.push(Span::raw(format!(" ({:.1}/s)", rate)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Format a count for display (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Render the command bar.
///
/// Commands that are invalid in the current state are greyed out.
pub fn render_commands(frame: &mut Frame, app: &App, area: Rect) {
    let enabled = app.controller.enabled_commands();
    let mut spans = vec![Span::raw(" ")];
    for kind in CommandKind::ALL {
        let style = app.theme.command_style(enabled.contains(&kind));
        spans.push(Span::styled(
            format!("{}:{}", key_for_command(kind), kind.label()),
            style,
        ));
        spans.push(Span::raw("  "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Shows temporary status messages, otherwise the input and the last error.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let status = match app.controller.session().last_error() {
        Some(err) => format!(
            " {} | Last error: {} | ?:help q:quit",
            app.source_description(),
            err
        ),
        None => format!(" {} | ?:help q:quit", app.source_description()),
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let mut help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Monitoring",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
    ];
    for kind in CommandKind::ALL {
        help_text.push(Line::from(format!(
            "  {}         {}",
            key_for_command(kind),
            kind.label()
        )));
    }
    help_text.extend([
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ]);

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 18u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
