//! TCFD Portal - a terminal client for the ESG/TCFD reporting services.
//!
//! Look up a company's financial statements, browse the TCFD disclosure
//! standards, draft a report with the language-model service and download
//! it as PDF or Word. A materiality assessment view ranks ESG issues.

mod app;
mod ui;
mod utils;

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tcfd_portal_core::api::ApiClient;
use tcfd_portal_core::auth::CredentialStore;
use tcfd_portal_core::config::Config;
use tcfd_portal_core::controller::LoginForm;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "tcfd-portal.log";

const USAGE: &str = "\
Usage: tcfd-portal [OPTIONS]

Options:
  --login            Log in from the command line and save the session
  --check-session    Verify the saved session with the auth service
  --logout           Clear the saved session, cache and stored password
  --dump-standards   Print the TCFD disclosure standards as JSON
  --ephemeral        Keep the session in memory only
  -h, --help         Show this help

Environment:
  TCFD_GATEWAY_URL, TCFD_AUTH_URL, TCFD_SERVICE_URL,
  TCFD_MATERIALITY_URL, TCFD_LLM_URL   Override service base URLs
  TCFD_PORTAL_USERNAME, TCFD_PORTAL_PASSWORD   Pre-fill login
  RUST_LOG                             Log filter (default: warn)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Login,
    CheckSession,
    Logout,
    DumpStandards,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Options {
    command: Command,
    ephemeral: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        command: Command::Run,
        ephemeral: false,
    };

    for arg in args {
        let command = match arg.as_str() {
            "--ephemeral" => {
                options.ephemeral = true;
                continue;
            }
            "--login" => Command::Login,
            "--check-session" => Command::CheckSession,
            "--logout" => Command::Logout,
            "--dump-standards" => Command::DumpStandards,
            "-h" | "--help" => Command::Help,
            other => bail!("Unknown option: {}\n\n{}", other, USAGE),
        };
        if options.command != Command::Run {
            bail!("Only one command may be given\n\n{}", USAGE);
        }
        options.command = command;
    }

    Ok(options)
}

/// Log to a daily file so output does not fight the terminal UI.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=tcfd_portal_core=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;
    if options.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;

    let log_dir = config
        .cache_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| std::env::temp_dir());
    let _guard = init_tracing(&log_dir);
    info!(command = ?options.command, "TCFD portal starting");

    let api = app::connect(&config, options.ephemeral)?;

    match options.command {
        Command::Run => run_tui(config, api).await,
        Command::Login => login(config, &api).await,
        Command::CheckSession => check_session(&api).await,
        Command::Logout => logout(&config, &api),
        Command::DumpStandards => dump_standards(&api).await,
        Command::Help => Ok(()),
    }
}

async fn run_tui(config: Config, api: ApiClient) -> Result<()> {
    let cache = app::open_cache(&config)?;
    let mut app = App::new(config, api, cache);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Cached data shows behind the login overlay while the session is checked
    app.start();

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("TCFD portal shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Apply results from completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }

        // Let spawned tasks make progress between frames
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Command-line utilities
// ============================================================================

async fn login(mut config: Config, api: &ApiClient) -> Result<()> {
    let auth_id = match std::env::var("TCFD_PORTAL_USERNAME") {
        Ok(id) if !id.trim().is_empty() => id,
        _ => prompt_username(config.last_username.as_deref())?,
    };
    let password = match std::env::var("TCFD_PORTAL_PASSWORD") {
        Ok(pw) if !pw.is_empty() => pw,
        _ => rpassword::prompt_password("Password: ")?,
    };

    let mut form = LoginForm::with_auth_id(auth_id);
    form.password = password.clone();
    let profile = form
        .submit(api.session())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let auth_id = form.auth_id.trim().to_string();
    if let Err(e) = CredentialStore::store(&auth_id, &password) {
        eprintln!("Warning: could not store password in keychain: {:#}", e);
    }
    config.last_username = Some(auth_id);
    config.save()?;

    println!("Logged in as {}", profile.display_name());
    Ok(())
}

fn prompt_username(default: Option<&str>) -> Result<String> {
    match default {
        Some(name) => print!("ID [{}]: ", name),
        None => print!("ID: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        default
            .map(str::to_string)
            .context("An ID is required")
    } else {
        Ok(input.to_string())
    }
}

/// Verify the saved session and report the outcome.
async fn check_session(api: &ApiClient) -> Result<()> {
    let snapshot = api.session().check_auth_status().await;
    match snapshot.user {
        Some(ref user) if snapshot.is_authenticated => {
            println!("Authenticated as {}", user.display_name());
            Ok(())
        }
        _ if snapshot.is_authenticated => {
            println!("Authenticated");
            Ok(())
        }
        _ => bail!("Not logged in. Run with --login or start the app to log in."),
    }
}

fn logout(config: &Config, api: &ApiClient) -> Result<()> {
    let cache = app::open_cache(config)?;
    app::sign_out(api, &cache, config)?;
    println!("Logged out");
    Ok(())
}

/// Dump the TCFD disclosure standards to stdout as JSON
async fn dump_standards(api: &ApiClient) -> Result<()> {
    let snapshot = api.session().check_auth_status().await;
    if !snapshot.is_authenticated {
        bail!("No saved session. Please run with --login first.");
    }

    eprintln!("Fetching TCFD standards...");
    let standards = api
        .tcfd_standards()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let json = serde_json::to_string_pretty(&standards)?;
    println!("{}", json);
    eprintln!("Done! {} disclosures exported.", standards.len());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
