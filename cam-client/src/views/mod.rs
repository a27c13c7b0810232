//! Screen layout.

use crate::state::{App, FormTarget, InputMode};
use crate::widgets::{DetailPanel, ListTable};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Span,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render_view(f: &mut Frame<'_>, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    render_header(f, app, layout[0]);

    match &app.detail {
        Some(record) => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(layout[1]);
            ListTable::new(app.view()).render(f, columns[0]);
            DetailPanel {
                title: "Record",
                record,
                style: Style::default().fg(Color::Cyan),
            }
            .render(f, columns[1]);
        }
        None => ListTable::new(app.view()).render(f, layout[1]),
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let view = app.view();
    let mut title = format!("CAM | {}", view.entity.route());
    if !view.search_term.is_empty() {
        title.push_str(&format!(" | search: {}", view.search_term));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title, Style::default().fg(Color::Cyan)));
    f.render_widget(block, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let view = app.view();
    let (text, style) = match (&app.mode, &view.delete_error, &app.status) {
        (InputMode::Search(input), _, _) => (format!("Search: {}_", input), Style::default()),
        (InputMode::Form { target, input }, _, _) => {
            let label = match target {
                FormTarget::Create => "New".to_string(),
                FormTarget::Edit(id) => format!("Edit {}", id),
            };
            match &view.write_error {
                Some(err) => (
                    format!("{}: {}_  ({})", label, input, err),
                    Style::default().fg(Color::Red),
                ),
                None => (format!("{}: {}_", label, input), Style::default()),
            }
        }
        (InputMode::ConfirmDelete(id), _, _) => (
            format!("Delete {}? (y/n)", id),
            Style::default().fg(Color::Yellow),
        ),
        (InputMode::Normal, Some(err), _) => (
            format!("Delete failed: {}", err),
            Style::default().fg(Color::Red),
        ),
        (InputMode::Normal, None, Some(status)) => (status.clone(), Style::default()),
        (InputMode::Normal, None, None) => {
            (app.action_hints(), Style::default().fg(Color::DarkGray))
        }
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(footer, area);
}
