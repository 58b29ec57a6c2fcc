//! Financial tab - statement tables for the selected company.
//!
//! The left panel lists the tables the service returned; the right panel
//! shows the selected table with one column per field.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table},
    Frame,
};
use tcfd_portal_core::controller::FetchKind;

use crate::app::App;
use crate::ui::styles;
use crate::utils::truncate_string;

/// Widest a single column may be drawn.
const MAX_COLUMN_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.dashboard.financial else {
        render_empty(frame, app, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(area);

    let names = data.table_names();
    let items: Vec<ListItem> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let rows = data.tables.get(*name).map(|t| t.row_count()).unwrap_or(0);
            let style = if i == app.financial_table_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(format!("{:<22} {:>4}", truncate_string(name, 22), rows)).style(style)
        })
        .collect();

    let company = app.dashboard.financial_company.as_deref().unwrap_or("");
    let list = List::new(items).block(
        Block::default()
            .title(format!(" {} ({}) ", truncate_string(company, 16), names.len()))
            .title_style(styles::title_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    let mut state = ListState::default();
    state.select(Some(app.financial_table_selection));
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let selected = names.get(app.financial_table_selection).copied();
    let Some(table) = selected.and_then(|name| data.tables.get(name)) else {
        let empty = Paragraph::new(Span::styled("No tables returned", styles::muted_style()))
            .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(true)));
        frame.render_widget(empty, chunks[1]);
        return;
    };

    let columns = table.columns();
    let rows = table.rows();

    let widths: Vec<Constraint> = columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let widest = rows
                .iter()
                .map(|r| r.get(c).map(|v| v.chars().count()).unwrap_or(0))
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(4);
            Constraint::Length(widest.min(MAX_COLUMN_WIDTH) as u16 + 1)
        })
        .collect();

    let header = Row::new(columns.iter().map(|c| Cell::from(c.clone())))
        .style(styles::header_style())
        .height(1);

    let body: Vec<Row> = rows
        .iter()
        .skip(app.financial_row_offset)
        .map(|row| {
            Row::new(
                row.iter()
                    .map(|v| Cell::from(truncate_string(v, MAX_COLUMN_WIDTH))),
            )
            .style(styles::list_item_style())
        })
        .collect();

    let title = if app.financial_row_offset > 0 {
        format!(
            " {} ({} rows, from row {}) ",
            selected.unwrap_or(""),
            rows.len(),
            app.financial_row_offset + 1
        )
    } else {
        format!(" {} ({} rows) ", selected.unwrap_or(""), rows.len())
    };
    let widget = Table::new(body, widths).header(header).block(
        Block::default()
            .title(title)
            .title_style(styles::title_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(true)),
    );
    frame.render_widget(widget, chunks[1]);
}

fn render_empty(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];
    if app.dashboard.is_loading(FetchKind::Financial) {
        lines.push(Line::from(Span::styled(
            "  Loading financial data...",
            styles::muted_style(),
        )));
    } else {
        lines.push(Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("/", styles::help_key_style()),
            Span::styled(" to enter a company name, then ", styles::muted_style()),
            Span::styled("Enter", styles::help_key_style()),
            Span::styled(" to load its financial statements.", styles::muted_style()),
        ]));
    }

    let block = Block::default()
        .title(" Financial Data ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
