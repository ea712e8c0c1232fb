//! Watchdog status shown in the status bar.

use std::fmt;

use serde::Serialize;

/// Glyph shown while monitoring is starting or running.
pub const WORKING_SYMBOL: &str = "⚙";
/// Glyph shown after an explicit stop or an end of input.
pub const HALTED_SYMBOL: &str = "X";
/// Glyph shown after a failed run.
pub const ERROR_SYMBOL: &str = "!";

/// Compact status indicator: a short symbol plus a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchdogState {
    pub symbol: String,
    pub label: String,
}

impl WatchdogState {
    fn new(symbol: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            label: label.into(),
        }
    }

    /// Neutral value before anything happened.
    pub fn unknown() -> Self {
        Self::new("?", "-")
    }

    /// Monitoring was (re)started.
    ///
    /// From the second start on the symbol carries the restart count so the
    /// operator can see how often monitoring was restarted in this run.
    pub fn working(restart_count: u32) -> Self {
        let symbol = if restart_count > 1 {
            format!("{}{} ", WORKING_SYMBOL, restart_count)
        } else {
            format!("{} ", WORKING_SYMBOL)
        };
        Self::new(symbol, "Monitoring")
    }

    pub fn halted() -> Self {
        Self::new(HALTED_SYMBOL, "Halted")
    }

    /// Halted because the worker failed.
    pub fn failed(reason: &str) -> Self {
        Self::new(ERROR_SYMBOL, format!("Halted: {}", reason))
    }

    /// Returns true if this is the indicator for a running session.
    pub fn is_working(&self) -> bool {
        self.symbol.starts_with(WORKING_SYMBOL)
    }
}

impl Default for WatchdogState {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol.trim_end(), self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_start_has_plain_symbol() {
        let state = WatchdogState::working(1);
        assert_eq!(state.symbol, "⚙ ");
        assert_eq!(state.label, "Monitoring");
        assert!(state.is_working());
    }

    #[test]
    fn test_restarts_are_annotated() {
        assert_eq!(WatchdogState::working(2).symbol, "⚙2 ");
        assert_eq!(WatchdogState::working(17).symbol, "⚙17 ");
    }

    #[test]
    fn test_halted_and_failed() {
        assert_eq!(WatchdogState::halted().to_string(), "X Halted");
        let failed = WatchdogState::failed("Device disconnected");
        assert_eq!(failed.symbol, ERROR_SYMBOL);
        assert_eq!(failed.label, "Halted: Device disconnected");
        assert!(!failed.is_working());
    }

    #[test]
    fn test_unknown_is_default() {
        assert_eq!(WatchdogState::default(), WatchdogState::unknown());
        assert_eq!(WatchdogState::unknown().to_string(), "? -");
    }
}
