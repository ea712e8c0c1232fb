//! Supporting data types for the monitoring core.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5s", "250ms")
//! - [`history`]: Recent telemetry records and record rate of the current run

pub mod duration;
pub mod history;

pub use history::RecordHistory;
