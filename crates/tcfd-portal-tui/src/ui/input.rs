//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Anything that touches the network is handed
//! to `App`, which runs it on a background task.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use tcfd_portal_core::controller::FetchKind;
use tcfd_portal_core::models::DocumentFormat;

use crate::app::{
    can_add_company_char, can_add_field_char, can_add_password_char, App, AppState, LoginFocus,
    SignupField, Tab, PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key),
        AppState::SigningUp => {
            handle_signup_input(app, key);
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('1') => app.current_tab = Tab::Financial,
        KeyCode::Char('2') => app.current_tab = Tab::Standards,
        KeyCode::Char('3') => app.current_tab = Tab::Report,
        KeyCode::Char('4') => app.current_tab = Tab::Materiality,
        KeyCode::Left => app.current_tab = app.current_tab.prev(),
        KeyCode::Right => app.current_tab = app.current_tab.next(),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Enter => app.refresh_current_tab(),
        KeyCode::Char('u') => app.start_fetch(FetchKind::Standards),
        KeyCode::Char('g') => app.start_fetch(FetchKind::Report),
        KeyCode::Char('L') => app.logout(),
        _ => match app.current_tab {
            Tab::Financial => handle_financial_input(app, key),
            Tab::Standards => handle_standards_input(app, key),
            Tab::Report => handle_report_input(app, key),
            Tab::Materiality => handle_materiality_input(app, key),
        },
    }

    Ok(false)
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.search_input.clear();
        }
        KeyCode::Enter => app.commit_search(),
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_company_char(app.search_input.chars().count(), c) {
                app.search_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => app.login_focus = app.login_focus.next(),
        KeyCode::Up | KeyCode::BackTab => app.login_focus = app.login_focus.prev(),
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                if !app.login.busy {
                    app.submit_login();
                }
            }
            LoginFocus::Signup => app.start_signup(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login.auth_id.pop();
            }
            LoginFocus::Password => {
                app.login.password.pop();
            }
            LoginFocus::Button | LoginFocus::Signup => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_field_char(app.login.auth_id.chars().count(), c) {
                    app.login.auth_id.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login.password.chars().count(), c) {
                    app.login.password.push(c);
                }
            }
            LoginFocus::Button | LoginFocus::Signup => {}
        },
        _ => {}
    }
    Ok(false)
}

fn signup_value(app: &mut App, field: SignupField) -> Option<&mut String> {
    let form = &mut app.signup;
    match field {
        SignupField::Id => Some(&mut form.auth_id),
        SignupField::Password => Some(&mut form.password),
        SignupField::Confirm => Some(&mut form.confirm_password),
        SignupField::Name => Some(&mut form.name),
        SignupField::Email => Some(&mut form.email),
        SignupField::Company => Some(&mut form.company_id),
        SignupField::Submit => None,
    }
}

fn handle_signup_input(app: &mut App, key: KeyEvent) {
    let field = app.signup_focus;
    match key.code {
        KeyCode::Esc => app.cancel_signup(),
        KeyCode::Down | KeyCode::Tab => app.signup_focus = field.next(),
        KeyCode::Up | KeyCode::BackTab => app.signup_focus = field.prev(),
        KeyCode::Enter => {
            if field == SignupField::Submit {
                if !app.signup.busy {
                    app.submit_signup();
                }
            } else {
                app.signup_focus = field.next();
            }
        }
        KeyCode::Backspace => {
            if let Some(value) = signup_value(app, field) {
                value.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(value) = signup_value(app, field) {
                let len = value.chars().count();
                let allowed = if field.is_secret() {
                    can_add_password_char(len, c)
                } else {
                    can_add_field_char(len, c)
                };
                if allowed {
                    value.push(c);
                }
            }
        }
        _ => {}
    }
}

fn handle_financial_input(app: &mut App, key: KeyEvent) {
    let tables = app.financial_table_count();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            if app.financial_table_selection > 0 {
                app.financial_table_selection -= 1;
                app.financial_row_offset = 0;
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.financial_table_selection + 1 < tables {
                app.financial_table_selection += 1;
                app.financial_row_offset = 0;
            }
        }
        KeyCode::PageDown => {
            let last = app.financial_row_count().saturating_sub(1);
            app.financial_row_offset = (app.financial_row_offset + PAGE_SCROLL_SIZE).min(last);
        }
        KeyCode::PageUp => {
            app.financial_row_offset = app.financial_row_offset.saturating_sub(PAGE_SCROLL_SIZE);
        }
        _ => {}
    }
}

fn handle_standards_input(app: &mut App, key: KeyEvent) {
    let count = app.dashboard.standards.len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.standards_selection = app.standards_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.standards_selection + 1 < count {
                app.standards_selection += 1;
            }
        }
        KeyCode::PageUp => {
            app.standards_selection = app.standards_selection.saturating_sub(PAGE_SCROLL_SIZE);
        }
        KeyCode::PageDown => {
            app.standards_selection =
                (app.standards_selection + PAGE_SCROLL_SIZE).min(count.saturating_sub(1));
        }
        KeyCode::Char(' ') => app.toggle_selected_standard(),
        _ => {}
    }
}

fn handle_report_input(app: &mut App, key: KeyEvent) {
    let page = PAGE_SCROLL_SIZE as u16;
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.report_scroll = app.report_scroll.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => app.report_scroll = app.report_scroll.saturating_add(1),
        KeyCode::PageUp => app.report_scroll = app.report_scroll.saturating_sub(page),
        KeyCode::PageDown => app.report_scroll = app.report_scroll.saturating_add(page),
        KeyCode::Home => app.report_scroll = 0,
        KeyCode::Char('v') => {
            app.report_show_polished = !app.report_show_polished;
            app.report_scroll = 0;
        }
        KeyCode::Char('p') => app.start_download(DocumentFormat::Pdf),
        KeyCode::Char('w') => app.start_download(DocumentFormat::Word),
        _ => {}
    }
}

fn handle_materiality_input(app: &mut App, key: KeyEvent) {
    let count = app.materiality.issues.len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.materiality_selection = app.materiality_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.materiality_selection + 1 < count {
                app.materiality_selection += 1;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    use crate::app::test_app;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_input(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    #[tokio::test]
    async fn test_number_keys_switch_tabs() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_input(&mut app, key(KeyCode::Char('4'))).unwrap();
        assert_eq!(app.current_tab, Tab::Materiality);
        handle_input(&mut app, key(KeyCode::Right)).unwrap();
        assert_eq!(app.current_tab, Tab::Financial);
        handle_input(&mut app, key(KeyCode::Left)).unwrap();
        assert_eq!(app.current_tab, Tab::Materiality);
    }

    #[tokio::test]
    async fn test_quit_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).unwrap());
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).unwrap());
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).unwrap());
    }

    #[tokio::test]
    async fn test_search_sets_company_for_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_input(&mut app, key(KeyCode::Char('/'))).unwrap();
        assert_eq!(app.state, AppState::Searching);
        type_text(&mut app, " 삼성전자 ");
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();

        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.dashboard.company_name, "삼성전자");
        assert_eq!(app.materiality.company_name, "삼성전자");
        assert!(app.dashboard.is_loading(FetchKind::Financial));
    }

    #[tokio::test]
    async fn test_escape_cancels_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_input(&mut app, key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "Acme");
        handle_input(&mut app, key(KeyCode::Esc)).unwrap();

        assert_eq!(app.state, AppState::Normal);
        assert!(app.dashboard.company_name.is_empty());
        assert!(!app.dashboard.any_loading());
    }

    #[tokio::test]
    async fn test_generate_without_company_shows_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.current_tab = Tab::Report;

        handle_input(&mut app, key(KeyCode::Char('g'))).unwrap();
        assert_eq!(app.dashboard.error.as_deref(), Some("Company name is required"));
        assert!(!app.dashboard.is_loading(FetchKind::Report));

        handle_input(&mut app, key(KeyCode::Char('p'))).unwrap();
        assert_eq!(app.dashboard.error.as_deref(), Some("Generate a report first"));
    }

    #[tokio::test]
    async fn test_login_overlay_typing_and_focus() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.start_login();
        assert_eq!(app.login_focus, LoginFocus::Username);

        type_text(&mut app, "alice");
        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        type_text(&mut app, "pq");
        handle_input(&mut app, key(KeyCode::Backspace)).unwrap();

        assert_eq!(app.login.auth_id, "alice");
        assert_eq!(app.login.password, "p");
        // 'q' is text here, not quit
        assert_eq!(app.state, AppState::LoggingIn);
    }

    #[tokio::test]
    async fn test_login_enter_with_empty_password_shows_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.start_login();
        type_text(&mut app, "alice");
        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();

        assert!(!app.login.busy);
        assert_eq!(app.login.error.as_deref(), Some("Password is required"));
    }

    #[tokio::test]
    async fn test_signup_overlay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.start_login();
        app.login_focus = LoginFocus::Signup;
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.state, AppState::SigningUp);

        type_text(&mut app, "bob");
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.signup_focus, SignupField::Password);
        type_text(&mut app, "secret");
        assert_eq!(app.signup.auth_id, "bob");
        assert_eq!(app.signup.password, "secret");

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.signup.password.is_empty());
    }

    #[tokio::test]
    async fn test_escape_on_login_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.start_login();
        assert!(handle_input(&mut app, key(KeyCode::Esc)).unwrap());
    }
}
