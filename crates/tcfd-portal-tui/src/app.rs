//! Application state for the TCFD portal terminal client.
//!
//! `App` owns the page controllers, the overlay forms and the background task
//! plumbing. Network work runs on spawned tasks that report back over an mpsc
//! channel; results are applied here, on the UI task, so controller state has
//! a single writer.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tcfd_portal_core::api::{ApiClient, AuthService, Endpoints, ReqwestTransport, Transport};
use tcfd_portal_core::auth::{
    CredentialStore, FileStorage, MemoryStorage, SessionSnapshot, SessionStorage, SessionStore,
};
use tcfd_portal_core::cache::{CacheAges, CacheManager};
use tcfd_portal_core::config::Config;
use tcfd_portal_core::controller::login::LoginAttempt;
use tcfd_portal_core::controller::{
    ActionError, DashboardTab, FetchKind, FetchOutcome, LoginForm, MaterialityOutcome,
    MaterialityTable, SignupForm, TcfdDashboard,
};
use tcfd_portal_core::models::{group_by_category, DocumentFormat, TcfdStandard, UserProfile};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for login ids, names and emails.
const MAX_FIELD_LENGTH: usize = 64;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for the company search box.
const MAX_COMPANY_NAME_LENGTH: usize = 100;

/// Number of rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

const ENV_USERNAME: &str = "TCFD_PORTAL_USERNAME";
const ENV_PASSWORD: &str = "TCFD_PORTAL_PASSWORD";

// ============================================================================
// Wiring
// ============================================================================

/// Build the transport, session store and API client from the config.
///
/// With `ephemeral` the session lives in memory only and nothing is written
/// to the session directory.
pub fn connect(config: &Config, ephemeral: bool) -> Result<ApiClient> {
    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::new(config.request_timeout()).context("Failed to build HTTP client")?,
    );

    let storage: Arc<dyn SessionStorage> = if ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(FileStorage::new(config.session_dir()?))
    };

    let endpoints = Endpoints::from_config(config);
    let auth = AuthService::new(transport.clone(), endpoints.auth.clone());
    let session = Arc::new(SessionStore::new(
        storage,
        auth,
        config.preserve_session_on_network_error,
    ));
    let api = ApiClient::new(transport, session, endpoints);
    Ok(api.with_report_timeout(config.report_timeout()))
}

pub fn open_cache(config: &Config) -> Result<CacheManager> {
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    CacheManager::new(cache_dir.join("data"))
}

/// Clear the persisted session, cached company data and the keychain entry
/// for the last login id.
pub fn sign_out(api: &ApiClient, cache: &CacheManager, config: &Config) -> Result<()> {
    if let Err(e) = cache.clear() {
        warn!(error = %e, "Failed to clear cache on logout");
    }
    if let Some(ref auth_id) = config.last_username {
        if let Err(e) = CredentialStore::delete(auth_id) {
            warn!(error = %e, "Failed to remove stored credentials");
        }
    }
    api.session()
        .logout()
        .context("Failed to clear the saved session")
}

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Financial,
    Standards,
    Report,
    Materiality,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Financial, Tab::Standards, Tab::Report, Tab::Materiality];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Financial => "Financial",
            Tab::Standards => "Standards",
            Tab::Report => "Report",
            Tab::Materiality => "Materiality",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Financial => Tab::Standards,
            Tab::Standards => Tab::Report,
            Tab::Report => Tab::Materiality,
            Tab::Materiality => Tab::Financial,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Financial => Tab::Materiality,
            Tab::Standards => Tab::Financial,
            Tab::Report => Tab::Standards,
            Tab::Materiality => Tab::Report,
        }
    }
}

impl From<DashboardTab> for Tab {
    fn from(tab: DashboardTab) -> Self {
        match tab {
            DashboardTab::Financial => Tab::Financial,
            DashboardTab::Standards => Tab::Standards,
            DashboardTab::Report => Tab::Report,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    SigningUp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
    Signup,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Signup,
            LoginFocus::Signup => LoginFocus::Username,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Signup,
            LoginFocus::Password => LoginFocus::Username,
            LoginFocus::Button => LoginFocus::Password,
            LoginFocus::Signup => LoginFocus::Button,
        }
    }
}

/// Sign-up form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupField {
    Id,
    Password,
    Confirm,
    Name,
    Email,
    Company,
    Submit,
}

impl SignupField {
    pub const INPUTS: [SignupField; 6] = [
        SignupField::Id,
        SignupField::Password,
        SignupField::Confirm,
        SignupField::Name,
        SignupField::Email,
        SignupField::Company,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SignupField::Id => "ID",
            SignupField::Password => "Password",
            SignupField::Confirm => "Confirm",
            SignupField::Name => "Name",
            SignupField::Email => "Email",
            SignupField::Company => "Company",
            SignupField::Submit => "Sign up",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, SignupField::Password | SignupField::Confirm)
    }

    pub fn next(&self) -> Self {
        match self {
            SignupField::Id => SignupField::Password,
            SignupField::Password => SignupField::Confirm,
            SignupField::Confirm => SignupField::Name,
            SignupField::Name => SignupField::Email,
            SignupField::Email => SignupField::Company,
            SignupField::Company => SignupField::Submit,
            SignupField::Submit => SignupField::Id,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            SignupField::Id => SignupField::Submit,
            SignupField::Password => SignupField::Id,
            SignupField::Confirm => SignupField::Password,
            SignupField::Name => SignupField::Confirm,
            SignupField::Email => SignupField::Name,
            SignupField::Company => SignupField::Email,
            SignupField::Submit => SignupField::Company,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Identifies a background task. Spawning into an occupied slot aborts the
/// task already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskSlot {
    SessionCheck,
    Login,
    Signup,
    Dashboard(FetchKind),
    Materiality,
}

/// Results sent from background tasks back to the UI task.
enum TaskResult {
    SessionChecked(SessionSnapshot),
    Login {
        attempt: LoginAttempt,
        result: Result<UserProfile, ActionError>,
    },
    Signup(Result<String, ActionError>),
    Dashboard {
        outcome: FetchOutcome,
        /// Switch to the tab the dashboard lands on. Off for refreshes the
        /// user did not ask for.
        follow: bool,
    },
    Materiality(MaterialityOutcome),
}

impl TaskResult {
    fn slot(&self) -> TaskSlot {
        match self {
            TaskResult::SessionChecked(_) => TaskSlot::SessionCheck,
            TaskResult::Login { .. } => TaskSlot::Login,
            TaskResult::Signup(_) => TaskSlot::Signup,
            TaskResult::Dashboard { outcome, .. } => TaskSlot::Dashboard(outcome.kind),
            TaskResult::Materiality(_) => TaskSlot::Materiality,
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub api: ApiClient,
    pub cache: CacheManager,
    session_rx: watch::Receiver<SessionSnapshot>,
    /// Set once the UI has seen an authenticated session. A later
    /// unauthenticated snapshot is then a forced logout.
    signed_in: bool,

    // Page controllers
    pub dashboard: TcfdDashboard,
    pub materiality: MaterialityTable,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub search_input: String,
    pub status_message: Option<String>,
    pub cache_ages: CacheAges,

    // Login / sign-up overlays
    pub login: LoginForm,
    pub login_focus: LoginFocus,
    pub login_notice: Option<String>,
    pub signup: SignupForm,
    pub signup_focus: SignupField,

    // Selection and scroll positions
    pub financial_table_selection: usize,
    pub financial_row_offset: usize,
    pub standards_selection: usize,
    pub report_scroll: u16,
    pub report_show_polished: bool,
    pub materiality_selection: usize,

    // Background tasks
    tasks: HashMap<TaskSlot, JoinHandle<()>>,
    task_tx: mpsc::Sender<TaskResult>,
    task_rx: mpsc::Receiver<TaskResult>,
}

impl App {
    pub fn new(config: Config, api: ApiClient, cache: CacheManager) -> Self {
        let session_rx = api.session().subscribe();
        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let auth_id = std::env::var(ENV_USERNAME)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let mut login = LoginForm::with_auth_id(auth_id);
        login.password = std::env::var(ENV_PASSWORD)
            .ok()
            .or_else(|| stored_password(&login.auth_id))
            .unwrap_or_default();

        Self {
            config,
            api,
            cache,
            session_rx,
            signed_in: false,

            dashboard: TcfdDashboard::new(),
            materiality: MaterialityTable::default(),

            state: AppState::Normal,
            current_tab: Tab::Financial,
            search_input: String::new(),
            status_message: None,
            cache_ages: CacheAges::default(),

            login,
            login_focus: LoginFocus::Username,
            login_notice: None,
            signup: SignupForm::default(),
            signup_focus: SignupField::Id,

            financial_table_selection: 0,
            financial_row_offset: 0,
            standards_selection: 0,
            report_scroll: 0,
            report_show_polished: true,
            materiality_selection: 0,

            tasks: HashMap::new(),
            task_tx,
            task_rx,
        }
    }

    /// Show cached data and start the session check.
    pub fn start(&mut self) {
        self.load_from_cache();
        self.status_message = Some("Checking session...".to_string());

        let session = self.api.session().clone();
        self.spawn(TaskSlot::SessionCheck, async move {
            TaskResult::SessionChecked(session.check_auth_status().await)
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.api.session().snapshot()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Show the login overlay.
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login.auth_id.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
    }

    pub fn submit_login(&mut self) {
        let Some(attempt) = self.login.begin() else {
            return;
        };
        self.login_notice = None;

        let session = self.api.session().clone();
        self.spawn(TaskSlot::Login, async move {
            let result = LoginForm::run(&session, &attempt).await;
            TaskResult::Login { attempt, result }
        });
    }

    pub fn start_signup(&mut self) {
        self.signup = SignupForm {
            auth_id: self.login.auth_id.clone(),
            ..Default::default()
        };
        self.signup_focus = SignupField::Id;
        self.state = AppState::SigningUp;
    }

    pub fn cancel_signup(&mut self) {
        self.signup = SignupForm::default();
        self.start_login();
    }

    pub fn submit_signup(&mut self) {
        let Some(request) = self.signup.begin() else {
            return;
        };
        let auth = self.api.session().auth_service().clone();
        self.spawn(TaskSlot::Signup, async move {
            TaskResult::Signup(SignupForm::run(&auth, &request).await)
        });
    }

    /// Explicit logout from the main screen.
    pub fn logout(&mut self) {
        if let Err(e) = sign_out(&self.api, &self.cache, &self.config) {
            error!(error = %e, "Logout failed");
            self.status_message = Some(format!("{:#}", e));
        }
        // Our own logout, not a forced one
        self.session_rx.borrow_and_update();
        self.signed_in = false;

        self.clear_user_data();
        self.login.password.clear();
        self.login.error = None;
        self.login_notice = Some("Signed out".to_string());
        self.start_login();
    }

    /// React to session changes made elsewhere, e.g. a failed token refresh
    /// inside an API call.
    fn check_session_changes(&mut self) {
        if !self.session_rx.has_changed().unwrap_or(false) {
            return;
        }
        let snapshot = self.session_rx.borrow_and_update().clone();
        if snapshot.is_authenticated || !self.signed_in {
            return;
        }
        self.signed_in = false;

        info!("Session ended, returning to login");
        self.clear_user_data();
        if matches!(
            self.state,
            AppState::LoggingIn | AppState::SigningUp | AppState::Quitting
        ) {
            return;
        }
        self.login.error = Some("Your session has expired. Please log in again.".to_string());
        self.start_login();
    }

    /// Cancel background work and drop everything loaded for the signed-out
    /// user. Standards stay, they are the same for everyone.
    fn clear_user_data(&mut self) {
        self.abort_all();
        self.dashboard.clear();
        self.materiality.clear();
        self.search_input.clear();
        self.reset_selections();
        self.status_message = None;
        self.refresh_cache_ages();
    }

    // =========================================================================
    // Cache
    // =========================================================================

    fn load_from_cache(&mut self) {
        match self.cache.load_standards() {
            Ok(Some(cached)) => self.dashboard.set_standards(cached.data),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load cached standards"),
        }
        self.refresh_cache_ages();
    }

    fn refresh_cache_ages(&mut self) {
        self.cache_ages = self.cache.get_cache_ages(
            self.dashboard.financial_company.as_deref(),
            self.materiality.loaded_company.as_deref(),
        );
    }

    /// Show fresh cached data for the company while the request runs.
    fn show_cached_company(&mut self, company_name: &str, tab: Tab) {
        match tab {
            Tab::Materiality => match self.cache.load_materiality(company_name) {
                Ok(Some(cached)) if !cached.is_stale() => {
                    self.materiality.show_cached(company_name, cached.data);
                    self.materiality_selection = 0;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to load cached materiality issues"),
            },
            _ => match self.cache.load_financial_data(company_name) {
                Ok(Some(cached)) if !cached.is_stale() => {
                    self.dashboard.show_cached_financial(company_name, cached.data);
                    self.financial_table_selection = 0;
                    self.financial_row_offset = 0;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to load cached financial data"),
            },
        }
        self.refresh_cache_ages();
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    fn spawn<F>(&mut self, slot: TaskSlot, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        let handle = tokio::spawn(async move {
            let result = task.await;
            if let Err(e) = tx.send(result).await {
                error!(error = %e, "Failed to send task result - channel closed");
            }
        });

        if let Some(previous) = self.tasks.insert(slot, handle) {
            if !previous.is_finished() {
                debug!(?slot, "Aborting superseded task");
                previous.abort();
            }
        }
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Start a dashboard fetch. Validation errors show up in
    /// `dashboard.error` without any request being made.
    pub fn start_fetch(&mut self, kind: FetchKind) {
        self.start_fetch_with(kind, true);
    }

    fn start_fetch_with(&mut self, kind: FetchKind, follow: bool) {
        let Ok(ticket) = self.dashboard.begin(kind) else {
            return;
        };
        self.status_message = Some(match kind {
            FetchKind::Financial => "Loading financial data...".to_string(),
            FetchKind::Standards => "Loading TCFD standards...".to_string(),
            FetchKind::Report => "Generating report...".to_string(),
            FetchKind::Download => "Downloading...".to_string(),
        });

        let api = self.api.clone();
        self.spawn(TaskSlot::Dashboard(kind), async move {
            TaskResult::Dashboard {
                outcome: TcfdDashboard::run(&api, ticket).await,
                follow,
            }
        });
    }

    pub fn start_download(&mut self, format: DocumentFormat) {
        let dir = self.config.download_dir();
        let Ok(ticket) = self.dashboard.begin_download(format, &dir) else {
            return;
        };
        self.status_message = Some(format!("Downloading {}...", format.label()));

        let api = self.api.clone();
        self.spawn(TaskSlot::Dashboard(FetchKind::Download), async move {
            TaskResult::Dashboard {
                outcome: TcfdDashboard::run(&api, ticket).await,
                follow: false,
            }
        });
    }

    pub fn start_materiality(&mut self) {
        let Ok(ticket) = self.materiality.begin() else {
            return;
        };
        self.status_message = Some("Loading materiality issues...".to_string());

        let api = self.api.clone();
        self.spawn(TaskSlot::Materiality, async move {
            TaskResult::Materiality(MaterialityTable::run(&api, ticket).await)
        });
    }

    /// Refresh standards in the background when the cached copy is stale.
    fn refresh_standards_if_stale(&mut self) {
        if self.cache.standards_stale() {
            debug!("Standards cache stale, refreshing");
            self.start_fetch_with(FetchKind::Standards, false);
        }
    }

    /// Run the current tab's primary fetch.
    pub fn refresh_current_tab(&mut self) {
        match self.current_tab {
            Tab::Financial => self.start_fetch(FetchKind::Financial),
            Tab::Standards => self.start_fetch(FetchKind::Standards),
            Tab::Report => self.start_fetch(FetchKind::Report),
            Tab::Materiality => self.start_materiality(),
        }
    }

    /// Commit the search box as the company for every page.
    pub fn commit_search(&mut self) {
        let company = self.search_input.trim().to_string();
        self.dashboard.company_name = company.clone();
        self.materiality.company_name = company.clone();
        self.state = AppState::Normal;

        match self.current_tab {
            Tab::Materiality => {
                self.show_cached_company(&company, Tab::Materiality);
                self.start_materiality();
            }
            Tab::Report => self.start_fetch(FetchKind::Report),
            Tab::Financial | Tab::Standards => {
                self.current_tab = Tab::Financial;
                self.show_cached_company(&company, Tab::Financial);
                self.start_fetch(FetchKind::Financial);
            }
        }
    }

    pub fn start_search(&mut self) {
        self.search_input = self.dashboard.company_name.clone();
        self.state = AppState::Searching;
    }

    /// Apply finished background work.
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.task_rx.try_recv() {
            results.push(result);
        }

        for result in results {
            let slot = result.slot();
            if self.tasks.get(&slot).is_some_and(JoinHandle::is_finished) {
                self.tasks.remove(&slot);
            }
            self.process_task_result(result);
        }

        self.check_session_changes();
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::SessionChecked(snapshot) => {
                self.session_rx.borrow_and_update();
                self.signed_in = snapshot.is_authenticated;
                if snapshot.is_authenticated {
                    self.status_message = snapshot
                        .user
                        .as_ref()
                        .map(|u| format!("Signed in as {}", u.display_name()));
                    self.refresh_standards_if_stale();
                } else {
                    self.status_message = None;
                    self.start_login();
                }
            }
            TaskResult::Login { attempt, result } => {
                self.login.complete(&result);
                self.session_rx.borrow_and_update();
                if let Ok(profile) = result {
                    self.signed_in = true;
                    self.remember_login(&attempt);
                    self.login_notice = None;
                    self.state = AppState::Normal;
                    self.status_message = Some(format!("Signed in as {}", profile.display_name()));
                    self.refresh_standards_if_stale();
                }
            }
            TaskResult::Signup(result) => {
                let message = result.as_ref().ok().cloned();
                if let Some(auth_id) = self.signup.complete(&result) {
                    self.login = LoginForm::with_auth_id(auth_id);
                    self.login_notice = message;
                    self.start_login();
                }
            }
            TaskResult::Dashboard { outcome, follow } => {
                let kind = outcome.kind;
                let ok = outcome.result.is_ok();
                if !self.dashboard.complete(outcome) {
                    return;
                }
                self.status_message = None;
                if ok {
                    self.on_dashboard_success(kind, follow);
                }
            }
            TaskResult::Materiality(outcome) => {
                let ok = outcome.result.is_ok();
                if !self.materiality.complete(outcome) {
                    return;
                }
                self.status_message = None;
                if ok {
                    self.materiality_selection = 0;
                    if let Some(ref company) = self.materiality.loaded_company {
                        if let Err(e) = self.cache.save_materiality(company, &self.materiality.issues) {
                            warn!(error = %e, "Failed to cache materiality issues");
                        }
                    }
                    self.refresh_cache_ages();
                }
            }
        }
    }

    fn on_dashboard_success(&mut self, kind: FetchKind, follow: bool) {
        match kind {
            FetchKind::Financial => {
                self.financial_table_selection = 0;
                self.financial_row_offset = 0;
                if let (Some(company), Some(data)) =
                    (&self.dashboard.financial_company, &self.dashboard.financial)
                {
                    if let Err(e) = self.cache.save_financial_data(company, data) {
                        warn!(error = %e, "Failed to cache financial data");
                    }
                }
            }
            FetchKind::Standards | FetchKind::Report => {
                if let Err(e) = self.cache.save_standards(&self.dashboard.standards) {
                    warn!(error = %e, "Failed to cache standards");
                }
                self.standards_selection = self
                    .standards_selection
                    .min(self.dashboard.standards.len().saturating_sub(1));
                if kind == FetchKind::Report {
                    self.report_scroll = 0;
                    self.report_show_polished = true;
                }
            }
            FetchKind::Download => {
                if let Some(ref path) = self.dashboard.last_download {
                    self.status_message = Some(format!("Saved {}", path.display()));
                }
            }
        }

        if follow && kind != FetchKind::Download {
            self.current_tab = self.dashboard.active_tab.into();
        }
        self.refresh_cache_ages();
    }

    fn remember_login(&mut self, attempt: &LoginAttempt) {
        if let Err(e) = CredentialStore::store(&attempt.auth_id, attempt.password()) {
            warn!(error = %e, "Failed to store credentials");
        }
        self.config.last_username = Some(attempt.auth_id.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    fn reset_selections(&mut self) {
        self.financial_table_selection = 0;
        self.financial_row_offset = 0;
        self.standards_selection = 0;
        self.report_scroll = 0;
        self.materiality_selection = 0;
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Standards in the order the Standards tab shows them.
    pub fn standards_in_display_order(&self) -> Vec<&TcfdStandard> {
        group_by_category(&self.dashboard.standards)
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect()
    }

    pub fn selected_standard(&self) -> Option<&TcfdStandard> {
        self.standards_in_display_order()
            .get(self.standards_selection)
            .copied()
    }

    pub fn toggle_selected_standard(&mut self) {
        if let Some(id) = self.selected_standard().map(|s| s.disclosure_id.clone()) {
            self.dashboard.toggle_disclosure(&id);
        }
    }

    pub fn financial_table_count(&self) -> usize {
        self.dashboard
            .financial
            .as_ref()
            .map(|d| d.tables.len())
            .unwrap_or(0)
    }

    /// Rows in the financial table currently selected.
    pub fn financial_row_count(&self) -> usize {
        self.dashboard
            .financial
            .as_ref()
            .and_then(|d| d.tables.values().nth(self.financial_table_selection))
            .map(|t| t.row_count())
            .unwrap_or(0)
    }

    /// The report text currently shown on the Report tab.
    pub fn report_text(&self) -> Option<&str> {
        self.dashboard.report.as_ref().map(|report| {
            if self.report_show_polished {
                report.best_text()
            } else {
                report.draft.as_str()
            }
        })
    }

    /// Age of the cached data behind the current tab.
    pub fn cache_age_text(&self) -> String {
        let company_age = match self.current_tab {
            Tab::Financial => self.cache_ages.financial.as_deref(),
            Tab::Materiality => self.cache_ages.materiality.as_deref(),
            Tab::Standards | Tab::Report => None,
        };
        match company_age {
            Some(age) => format!("Company data cached {}", age),
            None => format!("Standards updated {}", self.cache_ages.standards_age()),
        }
    }

    /// Error line for the current page.
    pub fn page_error(&self) -> Option<&str> {
        match self.current_tab {
            Tab::Materiality => self.materiality.error.as_deref(),
            _ => self.dashboard.error.as_deref(),
        }
    }
}

fn stored_password(auth_id: &str) -> Option<String> {
    if auth_id.is_empty() {
        return None;
    }
    CredentialStore::get_password(auth_id).ok()
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_field_char(current_len: usize, c: char) -> bool {
    current_len < MAX_FIELD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_company_char(current_len: usize, c: char) -> bool {
    current_len < MAX_COMPANY_NAME_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

/// App wired to services that are never reachable, with an empty cache in
/// `dir`.
#[cfg(test)]
pub(crate) fn test_app(dir: &tempfile::TempDir) -> App {
    let config = Config {
        // Nothing listens here; requests fail fast
        gateway_url: "http://127.0.0.1:9".to_string(),
        auth_url: "http://127.0.0.1:9".to_string(),
        tcfd_url: "http://127.0.0.1:9".to_string(),
        materiality_url: "http://127.0.0.1:9".to_string(),
        llm_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let api = connect(&config, true).unwrap();
    let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
    let mut app = App::new(config, api, cache);
    app.login.auth_id.clear();
    app.login.password.clear();
    app
}
