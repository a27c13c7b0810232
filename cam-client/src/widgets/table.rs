//! Generic record table with a pagination footer.

use crate::list_view::{ListView, LoadState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Paragraph, Row, Table, TableState},
    Frame,
};

pub struct ListTable<'a> {
    pub view: &'a ListView,
    pub header_style: Style,
    pub highlight_style: Style,
}

impl<'a> ListTable<'a> {
    pub fn new(view: &'a ListView) -> Self {
        Self {
            view,
            header_style: Style::default().add_modifier(Modifier::BOLD),
            highlight_style: Style::default().add_modifier(Modifier::REVERSED),
        }
    }

    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);

        let view = self.view;
        let header = Row::new(view.columns.iter().map(|c| c.header.clone())).style(self.header_style);
        let rows = view
            .rows
            .iter()
            .map(|row| Row::new(view.columns.iter().map(|c| c.cell(row))));
        let widths = vec![Constraint::Ratio(1, view.columns.len().max(1) as u32); view.columns.len()];

        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .title(view.entity.route())
                    .borders(Borders::ALL),
            )
            .highlight_style(self.highlight_style);

        let mut state = TableState::default();
        if !view.rows.is_empty() {
            state.select(Some(view.selected));
        }
        f.render_stateful_widget(table, chunks[0], &mut state);
        f.render_widget(Paragraph::new(footer_text(view)), chunks[1]);
    }
}

/// Pagination summary shown under the table.
pub fn footer_text(view: &ListView) -> String {
    let pages = view.page_count().max(1);
    let mut text = format!(
        "Page {} of {} | {} records | {} per page",
        view.page + 1,
        pages,
        view.total_count,
        view.page_size
    );
    match &view.state {
        LoadState::Loading => text.push_str(" | loading"),
        LoadState::Errored(message) => text.push_str(&format!(" | error: {message}")),
        LoadState::Idle | LoadState::Loaded => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_core::{EntityKind, Page};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    #[test]
    fn test_footer_counts_pages() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        let ticket = view.set_page(1);
        view.apply(ticket.version, Ok(Page::new(Vec::new(), 21)));
        assert_eq!(footer_text(&view), "Page 2 of 2 | 21 records | 20 per page");
    }

    #[test]
    fn test_table_renders_rows() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        view.columns = vec![crate::columns::Column::scalar("description")];
        let ticket = view.reload();
        let row = json!({ "description": "fraud case" }).as_object().cloned().unwrap();
        view.apply(ticket.version, Ok(Page::new(vec![row], 1)));

        let mut terminal = Terminal::new(TestBackend::new(60, 8)).unwrap();
        terminal
            .draw(|f| ListTable::new(&view).render(f, f.size()))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("fraud case"));
        assert!(content.contains("Page 1 of 1"));
    }
}
