use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, SignupField, Tab};

use super::styles;
use super::tabs::{financial, materiality, report, standards};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::SigningUp => render_signup_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  TCFD Portal";
    let user = app
        .snapshot()
        .user
        .map(|u| format!("{}  ", u.display_name()))
        .unwrap_or_default();
    let help_hint = "[?] Help";
    let used = title.chars().count() + user.chars().count() + help_hint.len() + 4;

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(user, styles::highlight_style()),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        if *tab == app.current_tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    // Company search on the right
    let company = if app.state == AppState::Searching {
        Span::styled(format!("Company: {}▌", app.search_input), styles::search_style())
    } else if app.dashboard.company_name.is_empty() {
        Span::styled("[/] Company", styles::muted_style())
    } else {
        Span::styled(
            format!("Company: {}", app.dashboard.company_name),
            styles::highlight_style(),
        )
    };
    let main_width: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(main_width + company.content.chars().count() + 2);
    spans.push(Span::raw(" ".repeat(padding)));
    spans.push(company);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Financial => financial::render(frame, app, area),
        Tab::Standards => standards::render(frame, app, area),
        Tab::Report => report::render(frame, app, area),
        Tab::Materiality => materiality::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.current_tab {
        Tab::Financial => "[/]company | [Enter]load | [q]uit",
        Tab::Standards => "[Space]select | [g]enerate | [u]pdate | [q]uit",
        Tab::Report => "[g]enerate | [p]df | [w]ord | [v]iew | [q]uit",
        Tab::Materiality => "[/]company | [Enter]load | [q]uit",
    };

    let (left_text, left_style) = if let Some(error) = app.page_error() {
        (format!(" {} ", error), styles::error_style())
    } else if let Some(ref msg) = app.status_message {
        (format!(" {} ", msg), styles::muted_style())
    } else {
        (format!(" {} ", app.cache_age_text()), styles::muted_style())
    };

    let right_text = format!(" {} ", shortcuts);
    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 27, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  TCFD Portal", styles::title_style())),
        Line::from(Span::styled(format!("  version {}", version), styles::muted_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-4", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("↑/↓ j/k", "Move selection / scroll"),
        help_line("PgUp/PgDn", "Scroll a page"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("/", "Set company name"),
        help_line("Enter", "Load the current tab"),
        help_line("Space", "Select disclosure (Standards)"),
        help_line("g", "Generate report"),
        help_line("p / w", "Download PDF / Word"),
        help_line("v", "Toggle draft / polished text"),
        help_line("u", "Update TCFD standards"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// One labelled input row, `[value▌]` when focused.
fn field_line(label: &str, value: &str, secret: bool, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let shown = if secret {
        "*".repeat(value.chars().count().min(18))
    } else {
        value.chars().rev().take(18).collect::<Vec<_>>().into_iter().rev().collect()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(format!("{:>9}: [", label), styles::muted_style()),
        Span::styled(format!("{:<18}{}", shown, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn button_line(label: &str, focused: bool, indent: usize) -> Line<'static> {
    let text = if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    Line::from(vec![
        Span::raw(format!("{}[", " ".repeat(indent))),
        Span::styled(text, style),
        Span::raw("]"),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let message_lines = usize::from(app.login.error.is_some()) + usize::from(app.login_notice.is_some());
    let height = 11 + message_lines as u16 * 2;
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("  TCFD Portal", styles::title_style())),
        Line::from(Span::styled("  ESG / TCFD reporting", styles::muted_style())),
        Line::from(""),
        field_line("ID", &app.login.auth_id, false, app.login_focus == LoginFocus::Username),
        field_line(
            "Password",
            &app.login.password,
            true,
            app.login_focus == LoginFocus::Password,
        ),
        Line::from(""),
    ];

    if app.login.busy {
        lines.push(Line::from(Span::styled("            Signing in...", styles::muted_style())));
    } else {
        lines.push(button_line("Login", app.login_focus == LoginFocus::Button, 12));
    }
    lines.push(button_line("Sign up", app.login_focus == LoginFocus::Signup, 11));

    if let Some(ref notice) = app.login_notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", notice), styles::success_style())));
    }
    if let Some(ref error) = app.login.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_signup_overlay(frame: &mut Frame, app: &App) {
    let height = if app.signup.error.is_some() { 16 } else { 14 };
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let form = &app.signup;
    let mut lines = vec![
        Line::from(Span::styled("  Create an account", styles::title_style())),
        Line::from(""),
    ];
    for field in SignupField::INPUTS {
        let value = match field {
            SignupField::Id => &form.auth_id,
            SignupField::Password => &form.password,
            SignupField::Confirm => &form.confirm_password,
            SignupField::Name => &form.name,
            SignupField::Email => &form.email,
            SignupField::Company => &form.company_id,
            SignupField::Submit => continue,
        };
        lines.push(field_line(field.label(), value, field.is_secret(), app.signup_focus == field));
    }
    lines.push(Line::from(""));
    if form.busy {
        lines.push(Line::from(Span::styled("           Creating account...", styles::muted_style())));
    } else {
        lines.push(button_line(
            SignupField::Submit.label(),
            app.signup_focus == SignupField::Submit,
            11,
        ));
    }
    lines.push(Line::from(vec![
        Span::styled("   ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" back to login", styles::muted_style()),
    ]));

    if let Some(ref error) = form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect_fixed(46, 10, area);
        assert_eq!(rect, Rect::new(27, 15, 46, 10));

        let small = Rect::new(0, 0, 20, 5);
        let rect = centered_rect_fixed(46, 10, small);
        assert_eq!(rect.width, 20);
        assert_eq!(rect.height, 5);
    }
}
