//! Authenticated client for the portal's backend services.
//!
//! Every call goes through `ApiClient::execute`, which attaches the persisted
//! bearer token and handles a 401 by refreshing the token and replaying the
//! request once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{
    filename_from_content_disposition, DocumentFormat, DownloadRequest, DownloadedDocument,
    FinancialData, FinancialDataResponse, GenerateReportRequest, GenerateReportResponse,
    GeneratedReport, MaterialityIssue, MaterialityResponse, StandardsResponse, TcfdStandard,
};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiError;

// ============================================================================
// Endpoints
// ============================================================================

const FINANCIAL_DATA_PATH: &str = "/api/v1/tcfd/company-financial-data";
const STANDARDS_PATH: &str = "/api/v1/tcfd/standards";
const GENERATE_REPORT_PATH: &str = "/api/v1/tcfd/generate-report";
const DOWNLOAD_PATH: &str = "/api/download";
const MATERIALITY_ISSUES_PATH: &str = "/api/v1/materiality/issues";

/// Base URLs of the backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub gateway: String,
    pub auth: String,
    pub tcfd: String,
    pub materiality: String,
    pub llm: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        let clean = |url: &str| url.trim().trim_end_matches('/').to_string();
        Self {
            gateway: clean(&config.gateway_url),
            auth: clean(&config.auth_url),
            tcfd: clean(&config.tcfd_url),
            materiality: clean(&config.materiality_url),
            llm: clean(&config.llm_url),
        }
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn with_company_query(base: &str, path: &str, company_name: &str) -> Result<String, ApiError> {
    Url::parse_with_params(&join(base, path), &[("company_name", company_name)])
        .map(String::from)
        .map_err(|e| ApiError::InvalidUrl(e.to_string()))
}

// ============================================================================
// Client
// ============================================================================

/// Whether a call carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Bearer,
    /// No token attached and no 401 handling.
    None,
}

/// Position of a request in its retry cycle. A request is sent at most twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Replay,
}

/// Clone is cheap: the transport and session store are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    endpoints: Endpoints,
    report_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            transport,
            session,
            endpoints,
            report_timeout: None,
        }
    }

    /// Give report generation its own timeout instead of the client-wide one.
    pub fn with_report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = Some(timeout);
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn authorize(&self, request: &HttpRequest, auth: Auth) -> HttpRequest {
        let request = request.clone();
        match (auth, self.session.persisted_token()) {
            (Auth::Bearer, Some(token)) => request.with_bearer(&token),
            _ => request,
        }
    }

    /// Send a request and return its successful response.
    ///
    /// On a 401 for an authenticated first attempt the token is refreshed and
    /// the request replayed once. If the refresh fails the session is logged
    /// out and `ApiError::Unauthorized` is returned. Every other failure
    /// propagates unchanged.
    pub async fn execute(&self, request: HttpRequest, auth: Auth) -> Result<HttpResponse, ApiError> {
        let mut attempt = Attempt::First;

        loop {
            let response = self
                .transport
                .send(self.authorize(&request, auth))
                .await?;

            if response.is_success() {
                return Ok(response);
            }

            let error = response.error();
            if auth == Auth::None || !error.is_unauthorized() {
                debug!(url = %request.url, status = response.status, "Request failed");
                return Err(error);
            }

            match attempt {
                Attempt::First => {
                    info!(url = %request.url, "Got 401, refreshing token");
                    if self.session.refresh_token().await {
                        attempt = Attempt::Replay;
                        continue;
                    }
                    warn!("Token refresh failed, logging out");
                    if let Err(e) = self.session.logout() {
                        warn!(error = %e, "Failed to clear session after refresh failure");
                    }
                    return Err(error);
                }
                Attempt::Replay => {
                    warn!(url = %request.url, "Replayed request was rejected again");
                    return Err(error);
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        self.execute(HttpRequest::get(url), Auth::Bearer)
            .await?
            .json()
    }

    // ===== Service calls =====

    /// Financial tables for a company.
    pub async fn company_financial_data(&self, company_name: &str) -> Result<FinancialData, ApiError> {
        let url = with_company_query(&self.endpoints.tcfd, FINANCIAL_DATA_PATH, company_name)?;
        let response: FinancialDataResponse = self.get_json(url).await?;
        let data = response.into_result()?;
        debug!(company = company_name, tables = data.tables.len(), "Fetched financial data");
        Ok(data)
    }

    pub async fn tcfd_standards(&self) -> Result<Vec<TcfdStandard>, ApiError> {
        let response: StandardsResponse = self
            .get_json(join(&self.endpoints.tcfd, STANDARDS_PATH))
            .await?;
        debug!(count = response.data.len(), "Fetched TCFD standards");
        Ok(response.data)
    }

    /// Draft a report with the LLM service.
    pub async fn generate_report(
        &self,
        request: &GenerateReportRequest,
    ) -> Result<GeneratedReport, ApiError> {
        let mut http =
            HttpRequest::post(join(&self.endpoints.llm, GENERATE_REPORT_PATH)).with_json(request)?;
        if let Some(timeout) = self.report_timeout {
            http = http.with_timeout(timeout);
        }
        let response: GenerateReportResponse = self.execute(http, Auth::Bearer).await?.json()?;
        response.into_report(&request.company_name)
    }

    /// Render a report as PDF or Word. This endpoint is unauthenticated.
    pub async fn download_document(
        &self,
        format: DocumentFormat,
        request: &DownloadRequest,
    ) -> Result<DownloadedDocument, ApiError> {
        let url = join(
            &self.endpoints.gateway,
            &format!("{}/{}", DOWNLOAD_PATH, format.endpoint()),
        );
        let http = HttpRequest::post(url).with_json(request)?;
        let response = self.execute(http, Auth::None).await?;

        let content_type = response.header("content-type").map(str::to_string);
        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            // The gateway reports render failures as a 2xx JSON body
            return Err(ApiError::Service(response.envelope_message().unwrap_or_else(
                || format!("{} generation failed", format.label()),
            )));
        }

        let filename = response
            .header("content-disposition")
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| {
                DownloadedDocument::fallback_filename(&request.company_name, format)
            });

        debug!(filename = %filename, bytes = response.body.len(), "Downloaded document");
        Ok(DownloadedDocument {
            filename,
            content_type,
            bytes: response.body,
        })
    }

    /// Materiality issues for a company, highest total score first.
    pub async fn materiality_issues(
        &self,
        company_name: &str,
    ) -> Result<Vec<MaterialityIssue>, ApiError> {
        let url = with_company_query(
            &self.endpoints.materiality,
            MATERIALITY_ISSUES_PATH,
            company_name,
        )?;
        let response: MaterialityResponse = self.get_json(url).await?;
        response.into_ranked()
    }
}
