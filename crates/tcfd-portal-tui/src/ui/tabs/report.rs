//! Report tab - the generated TCFD report draft.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tcfd_portal_core::controller::FetchKind;

use crate::app::App;
use crate::ui::styles;
use crate::utils::format_timestamp;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let generating = app.dashboard.is_loading(FetchKind::Report);

    let (title, lines) = match (&app.dashboard.report, app.report_text()) {
        (Some(report), Some(text)) => {
            let variant = if app.report_show_polished && report.polished.is_some() {
                "polished"
            } else {
                "draft"
            };
            let mut title = format!(
                " {} - {} ({}) ",
                report.company_name,
                variant,
                format_timestamp(&report.generated_at)
            );
            if generating {
                title.push_str("- regenerating... ");
            }
            let lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();
            (title, lines)
        }
        _ => {
            let hint = if generating {
                vec![Line::from(Span::styled(
                    "  Generating report. This can take a minute...",
                    styles::muted_style(),
                ))]
            } else {
                vec![
                    Line::from(""),
                    Line::from(vec![
                        Span::styled("  Press ", styles::muted_style()),
                        Span::styled("g", styles::help_key_style()),
                        Span::styled(
                            " to draft a report for the current company.",
                            styles::muted_style(),
                        ),
                    ]),
                    Line::from(Span::styled(
                        "  Loaded financial data and selected disclosures are included.",
                        styles::muted_style(),
                    )),
                ]
            };
            (" Report ".to_string(), hint)
        }
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.report_scroll, 0));
    frame.render_widget(paragraph, area);
}
