//! Telemetry view rendering.
//!
//! Displays the most recent records of the current run, newest last.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_duration;

/// Render the recent-records table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let history = app.controller.history();
    let block = Block::default()
        .title(format!(" Telemetry ({}) ", app.source_description()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    if history.records.is_empty() {
        let hint = if app.controller.state().is_active() {
            "Waiting for records..."
        } else {
            "No telemetry received"
        };
        let paragraph = Paragraph::new(format!(" {}", hint))
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    // Borders and header row take three lines
    let visible = area.height.saturating_sub(3) as usize;
    let skip = history.records.len().saturating_sub(visible);

    let header = Row::new(vec![
        Cell::from("Seq"),
        Cell::from("Age"),
        Cell::from("Record"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = history
        .records
        .iter()
        .zip(history.timestamps.iter())
        .skip(skip)
        .map(|(record, at)| {
            Row::new(vec![
                Cell::from(record.sequence.to_string()),
                Cell::from(format_duration(at.elapsed())),
                Cell::from(record.line.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(block);

    frame.render_widget(table, area);
}
