//! Materiality tab - ESG issues ranked by combined impact and financial score.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::{format_score, truncate_string};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(6)])
        .split(area);

    render_issue_table(frame, app, chunks[0]);
    render_issue_detail(frame, app, chunks[1]);
}

fn render_issue_table(frame: &mut Frame, app: &App, area: Rect) {
    let table = &app.materiality;

    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("Category"),
        Cell::from("Issue"),
        Cell::from("Impact"),
        Cell::from("Financial"),
        Cell::from("Total"),
    ])
    .style(styles::header_style())
    .height(1);

    let rows: Vec<Row> = if table.issues.is_empty() {
        let text = if table.is_loading() {
            "Loading materiality issues..."
        } else {
            "No issues loaded. Press / for a company, then Enter."
        };
        vec![Row::new(vec![
            Cell::from(""),
            Cell::from(Span::styled(text, styles::muted_style())),
        ])]
    } else {
        table
            .issues
            .iter()
            .enumerate()
            .map(|(i, issue)| {
                let total = issue.total_score();
                let style = if i == app.materiality_selection {
                    styles::selected_style()
                } else {
                    styles::list_item_style()
                };
                Row::new(vec![
                    Cell::from(format!("{:>2}", i + 1)),
                    Cell::from(truncate_string(&issue.category, 14)),
                    Cell::from(truncate_string(&issue.issue, 40)),
                    Cell::from(format!("{:>6}", format_score(issue.impact_score))),
                    Cell::from(format!("{:>9}", format_score(issue.financial_score))),
                    Cell::from(Span::styled(format!("{:>5.1}", total), styles::score_style(total))),
                ])
                .style(style)
            })
            .collect()
    };

    let widths = [
        Constraint::Length(3),
        Constraint::Length(15),
        Constraint::Fill(1),
        Constraint::Length(7),
        Constraint::Length(10),
        Constraint::Length(6),
    ];

    let company = table.loaded_company.as_deref().unwrap_or("no company");
    let loading = if table.is_loading() { " - loading..." } else { "" };
    let title = format!(" Materiality: {} ({}){} ", company, table.issues.len(), loading);

    let widget = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::title_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !table.issues.is_empty() {
        state.select(Some(app.materiality_selection));
    }
    frame.render_stateful_widget(widget, area, &mut state);
}

fn render_issue_detail(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match app.materiality.issues.get(app.materiality_selection) {
        Some(issue) => vec![
            Line::from(Span::styled(issue.issue.clone(), styles::highlight_style())),
            Line::from(
                issue
                    .description
                    .clone()
                    .unwrap_or_else(|| "No description".to_string()),
            ),
        ],
        None => vec![],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
