//! Standards tab - TCFD disclosures grouped by pillar.
//!
//! Disclosures marked with `[x]` are the ones a generated report covers.
//! With nothing marked, the report covers every disclosure.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use tcfd_portal_core::controller::FetchKind;
use tcfd_portal_core::models::group_by_category;

use crate::app::App;
use crate::ui::styles;
use crate::utils::truncate_string;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_disclosure_list(frame, app, chunks[0]);
    render_disclosure_detail(frame, app, chunks[1]);
}

fn render_disclosure_list(frame: &mut Frame, app: &App, area: Rect) {
    let standards = &app.dashboard.standards;
    let summary_width = (area.width as usize).saturating_sub(18);

    let mut items: Vec<ListItem> = Vec::new();
    let mut selected_row = None;
    let mut index = 0;

    for (category, disclosures) in group_by_category(standards) {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} ({})", category.label(), disclosures.len()),
            styles::header_style(),
        ))));

        for standard in disclosures {
            let marker = if app.dashboard.selected.contains(&standard.disclosure_id) {
                "[x]"
            } else {
                "[ ]"
            };
            let style = if index == app.standards_selection {
                selected_row = Some(items.len());
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            items.push(
                ListItem::new(format!(
                    "  {} {:<8} {}",
                    marker,
                    truncate_string(&standard.disclosure_id, 8),
                    truncate_string(standard.summary(), summary_width)
                ))
                .style(style),
            );
            index += 1;
        }
    }

    if items.is_empty() {
        let text = if app.dashboard.is_loading(FetchKind::Standards) {
            "Loading TCFD standards..."
        } else {
            "No standards loaded. Press [u] to fetch them."
        };
        items.push(ListItem::new(Span::styled(text, styles::muted_style())));
    }

    let selected_count = app.dashboard.selected.len();
    let title = if selected_count == 0 {
        format!(" Disclosures ({}) - all in report ", standards.len())
    } else {
        format!(" Disclosures ({}) - {} selected ", standards.len(), selected_count)
    };

    let list = List::new(items).block(
        Block::default()
            .title(title)
            .title_style(styles::title_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(true)),
    );

    let mut state = ListState::default();
    state.select(selected_row);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_disclosure_detail(frame: &mut Frame, app: &App, area: Rect) {
    let (title, lines) = match app.selected_standard() {
        Some(standard) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Pillar: ", styles::highlight_style()),
                    Span::raw(standard.category.label().to_string()),
                ]),
                Line::from(""),
                Line::from(Span::styled(standard.summary().to_string(), styles::title_style())),
                Line::from(""),
            ];
            if let Some(ref description) = standard.description {
                lines.push(Line::from(description.clone()));
                lines.push(Line::from(""));
            }
            if let Some(ref reference) = standard.reference {
                lines.push(Line::from(vec![
                    Span::styled("Reference: ", styles::highlight_style()),
                    Span::styled(reference.clone(), styles::muted_style()),
                ]));
            }
            (format!(" {} ", standard.disclosure_id), lines)
        }
        None => (
            " No Disclosure Selected ".to_string(),
            vec![Line::from(Span::styled(
                "Select a disclosure from the list",
                styles::muted_style(),
            ))],
        ),
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
