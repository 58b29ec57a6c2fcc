//! TCFD dashboard: financial data lookup, disclosure standards, report
//! drafting and document download for one company.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::{
    DocumentFormat, DownloadRequest, FinancialData, GenerateReportRequest, GeneratedReport,
    TcfdStandard,
};

use super::{required, ActionError, RequestGate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DashboardTab {
    #[default]
    Financial,
    Standards,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Financial,
    Standards,
    Report,
    Download,
}

/// What a ticket asks `run` to do. Captured at `begin` time so later edits
/// to the form do not change a request already in flight.
#[derive(Debug, Clone)]
enum FetchRequest {
    Financial {
        company_name: String,
    },
    Standards,
    Report {
        request: GenerateReportRequest,
        fetch_standards: bool,
    },
    Download {
        format: DocumentFormat,
        request: DownloadRequest,
        dir: PathBuf,
    },
}

/// A validated request with its generation.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub kind: FetchKind,
    pub generation: u64,
    request: FetchRequest,
}

#[derive(Debug)]
pub enum FetchPayload {
    Financial {
        company_name: String,
        data: FinancialData,
    },
    Standards(Vec<TcfdStandard>),
    Report {
        /// Standards fetched on the way, when none were loaded.
        standards: Option<Vec<TcfdStandard>>,
        report: GeneratedReport,
    },
    Downloaded(PathBuf),
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub kind: FetchKind,
    pub generation: u64,
    pub result: Result<FetchPayload, ActionError>,
}

/// Dashboard page state.
#[derive(Debug, Default)]
pub struct TcfdDashboard {
    pub active_tab: DashboardTab,
    /// Search box contents.
    pub company_name: String,
    /// Company the loaded financial data belongs to.
    pub financial_company: Option<String>,
    pub financial: Option<FinancialData>,
    pub standards: Vec<TcfdStandard>,
    /// Disclosures picked for the report. Empty means all.
    pub selected: BTreeSet<String>,
    pub report: Option<GeneratedReport>,
    pub last_download: Option<PathBuf>,
    pub error: Option<String>,
    gates: HashMap<FetchKind, RequestGate>,
}

impl TcfdDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self, kind: FetchKind) -> bool {
        self.gates.get(&kind).is_some_and(RequestGate::in_flight)
    }

    pub fn any_loading(&self) -> bool {
        self.gates.values().any(RequestGate::in_flight)
    }

    pub fn toggle_disclosure(&mut self, disclosure_id: &str) {
        if !self.selected.remove(disclosure_id) {
            self.selected.insert(disclosure_id.to_string());
        }
    }

    fn disclosure_ids(&self) -> Vec<String> {
        if self.selected.is_empty() {
            self.standards.iter().map(|s| s.disclosure_id.clone()).collect()
        } else {
            self.selected.iter().cloned().collect()
        }
    }

    /// Financial data for `company_name`, if that is what is loaded.
    fn financial_for(&self, company_name: &str) -> Option<FinancialData> {
        match (&self.financial_company, &self.financial) {
            (Some(loaded), Some(data)) if loaded == company_name => Some(data.clone()),
            _ => None,
        }
    }

    fn validate(&self, kind: FetchKind, download: Option<(DocumentFormat, &Path)>) -> Result<FetchRequest, ValidationError> {
        match kind {
            FetchKind::Financial => Ok(FetchRequest::Financial {
                company_name: required(&self.company_name, "Company name")?.to_string(),
            }),
            FetchKind::Standards => Ok(FetchRequest::Standards),
            FetchKind::Report => {
                let company_name = required(&self.company_name, "Company name")?;
                Ok(FetchRequest::Report {
                    request: GenerateReportRequest {
                        company_name: company_name.to_string(),
                        financial_data: self.financial_for(company_name),
                        disclosure_ids: self.disclosure_ids(),
                    },
                    fetch_standards: self.standards.is_empty(),
                })
            }
            FetchKind::Download => {
                let (format, dir) = download.ok_or(ValidationError::NoDocumentFormat)?;
                let report = self.report.as_ref().ok_or(ValidationError::NoReport)?;
                Ok(FetchRequest::Download {
                    format,
                    request: DownloadRequest {
                        company_name: report.company_name.clone(),
                        draft: report.draft.clone(),
                        polished: report.polished.clone().unwrap_or_default(),
                    },
                    dir: dir.to_path_buf(),
                })
            }
        }
    }

    fn issue(&mut self, kind: FetchKind, request: FetchRequest) -> FetchTicket {
        self.error = None;
        let generation = self.gates.entry(kind).or_default().issue();
        debug!(?kind, generation, "Fetch started");
        FetchTicket {
            kind,
            generation,
            request,
        }
    }

    /// Validate the form for `kind` and issue a ticket. Validation errors are
    /// also shown inline. Use `begin_download` for downloads.
    pub fn begin(&mut self, kind: FetchKind) -> Result<FetchTicket, ValidationError> {
        let request = self.validate(kind, None).inspect_err(|e| {
            self.error = Some(e.to_string());
        })?;
        Ok(self.issue(kind, request))
    }

    pub fn begin_download(
        &mut self,
        format: DocumentFormat,
        dir: &Path,
    ) -> Result<FetchTicket, ValidationError> {
        let request = self
            .validate(FetchKind::Download, Some((format, dir)))
            .inspect_err(|e| {
                self.error = Some(e.to_string());
            })?;
        Ok(self.issue(FetchKind::Download, request))
    }

    /// Perform the calls for a ticket. Steps run in order; the first failure
    /// ends the sequence.
    pub async fn run(api: &ApiClient, ticket: FetchTicket) -> FetchOutcome {
        let result = match ticket.request {
            FetchRequest::Financial { company_name } => api
                .company_financial_data(&company_name)
                .await
                .map(|data| FetchPayload::Financial { company_name, data })
                .map_err(ActionError::from),
            FetchRequest::Standards => api
                .tcfd_standards()
                .await
                .map(FetchPayload::Standards)
                .map_err(ActionError::from),
            FetchRequest::Report {
                request,
                fetch_standards,
            } => Self::run_report(api, request, fetch_standards).await,
            FetchRequest::Download {
                format,
                request,
                dir,
            } => Self::run_download(api, format, &request, &dir).await,
        };

        FetchOutcome {
            kind: ticket.kind,
            generation: ticket.generation,
            result,
        }
    }

    async fn run_report(
        api: &ApiClient,
        mut request: GenerateReportRequest,
        fetch_standards: bool,
    ) -> Result<FetchPayload, ActionError> {
        let standards = if fetch_standards {
            let standards = api.tcfd_standards().await?;
            if request.disclosure_ids.is_empty() {
                request.disclosure_ids = standards.iter().map(|s| s.disclosure_id.clone()).collect();
            }
            Some(standards)
        } else {
            None
        };

        let report = api.generate_report(&request).await?;
        Ok(FetchPayload::Report { standards, report })
    }

    async fn run_download(
        api: &ApiClient,
        format: DocumentFormat,
        request: &DownloadRequest,
        dir: &Path,
    ) -> Result<FetchPayload, ActionError> {
        let document = api.download_document(format, request).await?;
        let path = document.save_to(dir).map_err(ActionError::Save)?;
        Ok(FetchPayload::Downloaded(path))
    }

    /// Apply an outcome. Returns false when it was discarded as stale.
    pub fn complete(&mut self, outcome: FetchOutcome) -> bool {
        let current = self
            .gates
            .get_mut(&outcome.kind)
            .is_some_and(|gate| gate.settle(outcome.generation));
        if !current {
            debug!(kind = ?outcome.kind, generation = outcome.generation, "Discarding stale result");
            return false;
        }

        match outcome.result {
            Ok(payload) => {
                self.error = None;
                self.apply(payload);
            }
            Err(e) => {
                warn!(kind = ?outcome.kind, error = %e, "Dashboard fetch failed");
                self.error = Some(e.user_message());
            }
        }
        true
    }

    fn apply(&mut self, payload: FetchPayload) {
        match payload {
            FetchPayload::Financial { company_name, data } => {
                self.financial_company = Some(company_name);
                self.financial = Some(data);
                self.active_tab = DashboardTab::Financial;
            }
            FetchPayload::Standards(standards) => {
                self.set_standards(standards);
                self.active_tab = DashboardTab::Standards;
            }
            FetchPayload::Report { standards, report } => {
                if let Some(standards) = standards {
                    self.set_standards(standards);
                }
                self.report = Some(report);
                self.active_tab = DashboardTab::Report;
            }
            FetchPayload::Downloaded(path) => {
                self.last_download = Some(path);
            }
        }
    }

    /// Show cached financial data while a fresh request runs.
    pub fn show_cached_financial(&mut self, company_name: &str, data: FinancialData) {
        self.financial_company = Some(company_name.to_string());
        self.financial = Some(data);
    }

    /// Drop everything loaded and cancel requests in flight. The standards
    /// list is not tied to a user and is kept.
    pub fn clear(&mut self) {
        let mut gates = std::mem::take(&mut self.gates);
        gates.values_mut().for_each(RequestGate::cancel);
        let standards = std::mem::take(&mut self.standards);
        *self = Self {
            standards,
            gates,
            ..Self::default()
        };
    }

    /// Replace the standards list, dropping selections that no longer exist.
    pub fn set_standards(&mut self, standards: Vec<TcfdStandard>) {
        self.selected
            .retain(|id| standards.iter().any(|s| &s.disclosure_id == id));
        self.standards = standards;
    }

    /// begin, run and complete in one go.
    pub async fn execute(&mut self, api: &ApiClient, kind: FetchKind) -> bool {
        match self.begin(kind) {
            Ok(ticket) => {
                let outcome = Self::run(api, ticket).await;
                self.complete(outcome)
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::testing::{json_response, status_response, Harness};
    use serde_json::json;
    use tempfile::TempDir;

    fn signed_in() -> Harness {
        let h = Harness::new(true);
        h.session
            .login("alice", UserProfile::new("alice"), "tok123")
            .unwrap();
        h
    }

    fn financial_body(revenue: u64) -> serde_json::Value {
        json!({"success": true, "data": {"income": [{"year": 2023, "revenue": revenue}]}})
    }

    fn standards_body() -> serde_json::Value {
        json!({"data": [
            {"category": "Governance", "disclosure_id": "G-1"},
            {"category": "Strategy", "disclosure_id": "S-1"}
        ]})
    }

    #[tokio::test]
    async fn test_empty_company_is_rejected_without_request() {
        let h = signed_in();
        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "   ".to_string();

        assert!(!dashboard.execute(&h.api, FetchKind::Financial).await);
        assert_eq!(dashboard.error.as_deref(), Some("Company name is required"));
        assert!(!dashboard.is_loading(FetchKind::Financial));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_financial_fetch_stores_data_and_switches_tab() {
        let h = signed_in();
        h.respond(json_response(200, financial_body(10)));

        let mut dashboard = TcfdDashboard::new();
        dashboard.active_tab = DashboardTab::Report;
        dashboard.company_name = "Acme".to_string();

        assert!(dashboard.execute(&h.api, FetchKind::Financial).await);
        assert_eq!(dashboard.active_tab, DashboardTab::Financial);
        assert_eq!(dashboard.financial_company.as_deref(), Some("Acme"));
        assert_eq!(dashboard.financial.as_ref().unwrap().table_names(), vec!["income"]);
        assert!(dashboard.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state() {
        let h = signed_in();
        h.respond(json_response(200, financial_body(10)))
            .respond(status_response(503));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "Acme".to_string();
        assert!(dashboard.execute(&h.api, FetchKind::Financial).await);
        let before = dashboard.financial.clone();

        dashboard.company_name = "Other".to_string();
        dashboard.active_tab = DashboardTab::Standards;
        assert!(dashboard.execute(&h.api, FetchKind::Financial).await);

        assert_eq!(dashboard.financial, before);
        assert_eq!(dashboard.financial_company.as_deref(), Some("Acme"));
        assert_eq!(dashboard.active_tab, DashboardTab::Standards);
        assert!(dashboard.error.is_some());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let h = signed_in();
        h.respond(json_response(200, financial_body(1)))
            .respond(json_response(200, financial_body(2)));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "Old".to_string();
        let first = dashboard.begin(FetchKind::Financial).unwrap();
        dashboard.company_name = "New".to_string();
        let second = dashboard.begin(FetchKind::Financial).unwrap();

        let first_outcome = TcfdDashboard::run(&h.api, first).await;
        let second_outcome = TcfdDashboard::run(&h.api, second).await;

        // The newer request resolves first; the older one must not overwrite it
        assert!(dashboard.complete(second_outcome));
        assert!(!dashboard.complete(first_outcome));
        assert_eq!(dashboard.financial_company.as_deref(), Some("New"));
        assert!(!dashboard.is_loading(FetchKind::Financial));
    }

    #[tokio::test]
    async fn test_report_fetches_standards_first_when_missing() {
        let h = signed_in();
        h.respond(json_response(200, standards_body())).respond(json_response(
            200,
            json!({"success": true, "report_content": "Draft text"}),
        ));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "Acme".to_string();
        assert!(dashboard.execute(&h.api, FetchKind::Report).await);

        let urls = h.transport.urls();
        assert!(urls[0].ends_with("/api/v1/tcfd/standards"));
        assert!(urls[1].ends_with("/api/v1/tcfd/generate-report"));

        let body: serde_json::Value =
            serde_json::from_slice(h.transport.requests()[1].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["disclosure_ids"], json!(["G-1", "S-1"]));
        assert!(body.get("financial_data").is_none());

        assert_eq!(dashboard.standards.len(), 2);
        assert_eq!(dashboard.report.as_ref().unwrap().draft, "Draft text");
        assert_eq!(dashboard.active_tab, DashboardTab::Report);
    }

    #[tokio::test]
    async fn test_report_uses_selection_and_loaded_financials() {
        let h = signed_in();
        h.respond(json_response(200, financial_body(10)))
            .respond(json_response(200, standards_body()))
            .respond(json_response(200, json!({"success": true, "report_content": "Draft"})));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "Acme".to_string();
        assert!(dashboard.execute(&h.api, FetchKind::Financial).await);
        assert!(dashboard.execute(&h.api, FetchKind::Standards).await);
        dashboard.toggle_disclosure("S-1");
        assert!(dashboard.execute(&h.api, FetchKind::Report).await);

        // financial, standards, report: no second standards call
        assert_eq!(h.transport.request_count(), 3);
        let body: serde_json::Value =
            serde_json::from_slice(h.transport.requests()[2].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["disclosure_ids"], json!(["S-1"]));
        assert_eq!(body["financial_data"]["income"][0]["revenue"], json!(10));
    }

    #[tokio::test]
    async fn test_report_failure_in_standards_step_stops_sequence() {
        let h = signed_in();
        h.respond(status_response(500));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "Acme".to_string();
        assert!(dashboard.execute(&h.api, FetchKind::Report).await);
        assert_eq!(h.transport.request_count(), 1);
        assert!(dashboard.report.is_none());
        assert!(dashboard.error.is_some());
    }

    #[tokio::test]
    async fn test_download_requires_report() {
        let h = signed_in();
        let dir = TempDir::new().unwrap();
        let mut dashboard = TcfdDashboard::new();

        assert_eq!(
            dashboard
                .begin_download(DocumentFormat::Pdf, dir.path())
                .unwrap_err(),
            ValidationError::NoReport
        );
        assert_eq!(dashboard.error.as_deref(), Some("Generate a report first"));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_download_through_begin_asks_for_format() {
        let h = signed_in();
        let mut dashboard = TcfdDashboard::new();
        dashboard.report = Some(GeneratedReport {
            company_name: "Acme".to_string(),
            draft: "Draft".to_string(),
            polished: None,
            generated_at: chrono::Utc::now(),
        });

        assert_eq!(
            dashboard.begin(FetchKind::Download).unwrap_err(),
            ValidationError::NoDocumentFormat
        );
        assert_eq!(dashboard.error.as_deref(), Some("Choose PDF or Word to download"));
        assert!(!dashboard.is_loading(FetchKind::Download));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_download_saves_document() {
        let h = signed_in();
        let dir = TempDir::new().unwrap();
        let mut headers = std::collections::HashMap::new();
        headers.insert("content-type".to_string(), "application/pdf".to_string());
        h.respond(crate::api::HttpResponse {
            status: 200,
            headers,
            body: b"%PDF".to_vec(),
        });

        let mut dashboard = TcfdDashboard::new();
        dashboard.report = Some(GeneratedReport {
            company_name: "Acme".to_string(),
            draft: "Draft".to_string(),
            polished: None,
            generated_at: chrono::Utc::now(),
        });

        let ticket = dashboard
            .begin_download(DocumentFormat::Pdf, dir.path())
            .unwrap();
        assert!(dashboard.is_loading(FetchKind::Download));
        let outcome = TcfdDashboard::run(&h.api, ticket).await;
        assert!(dashboard.complete(outcome));

        let path = dashboard.last_download.clone().unwrap();
        assert_eq!(path, dir.path().join("Acme_TCFD_report.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF");

        let body: serde_json::Value =
            serde_json::from_slice(h.transport.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"company_name": "Acme", "draft": "Draft", "polished": ""}));
    }

    #[tokio::test]
    async fn test_clear_drops_company_data_and_cancels_fetches() {
        let h = signed_in();
        h.respond(json_response(200, financial_body(10)))
            .respond(json_response(200, financial_body(20)));

        let mut dashboard = TcfdDashboard::new();
        dashboard.company_name = "AliceCo".to_string();
        assert!(dashboard.execute(&h.api, FetchKind::Financial).await);
        dashboard.set_standards(vec![TcfdStandard {
            category: crate::models::TcfdCategory::Governance,
            disclosure_id: "G-1".to_string(),
            disclosure_summary: None,
            description: None,
            reference: None,
        }]);
        dashboard.toggle_disclosure("G-1");

        let pending = dashboard.begin(FetchKind::Financial).unwrap();
        dashboard.clear();
        assert!(!dashboard.any_loading());
        assert!(dashboard.financial.is_none());
        assert!(dashboard.financial_company.is_none());
        assert!(dashboard.company_name.is_empty());
        assert!(dashboard.selected.is_empty());
        assert_eq!(dashboard.standards.len(), 1);

        // The cancelled fetch arrives after the reset and is dropped
        let outcome = TcfdDashboard::run(&h.api, pending).await;
        assert!(!dashboard.complete(outcome));
        assert!(dashboard.financial.is_none());
    }

    #[test]
    fn test_set_standards_drops_missing_selection() {
        let mut dashboard = TcfdDashboard::new();
        dashboard.toggle_disclosure("G-1");
        dashboard.toggle_disclosure("X-9");
        dashboard.toggle_disclosure("X-9");
        assert_eq!(dashboard.selected.len(), 1);

        dashboard.set_standards(Vec::new());
        assert!(dashboard.selected.is_empty());
    }
}
