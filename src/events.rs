use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::App;
use crate::monitor::CommandKind;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// The command triggered by a key, if any.
pub fn command_for_key(code: KeyCode) -> Option<CommandKind> {
    match code {
        KeyCode::Char('s') => Some(CommandKind::Start),
        KeyCode::Char('w') => Some(CommandKind::StartWithSimulation),
        KeyCode::Char('h') => Some(CommandKind::Halt),
        KeyCode::Char('r') => Some(CommandKind::Restart),
        KeyCode::Char('t') => Some(CommandKind::TestConnection),
        KeyCode::Char('o') => Some(CommandKind::OpenLog),
        KeyCode::Char('c') => Some(CommandKind::CloseLog),
        _ => None,
    }
}

/// Key shown next to a command in the command bar.
pub fn key_for_command(kind: CommandKind) -> char {
    match kind {
        CommandKind::Start => 's',
        CommandKind::StartWithSimulation => 'w',
        CommandKind::Halt => 'h',
        CommandKind::Restart => 'r',
        CommandKind::TestConnection => 't',
        CommandKind::OpenLog => 'o',
        CommandKind::CloseLog => 'c',
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Windows reports releases as well
    if key.kind == KeyEventKind::Release {
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('?') => app.toggle_help(),
        code => {
            if let Some(kind) = command_for_key(code) {
                app.trigger(kind);
            }
        }
    }
}
