//! Payloads exchanged with the backend services.
//!
//! - `auth`: login, signup, refresh and the cached user profile
//! - `tcfd`: financial data tables, TCFD disclosure standards, report drafts
//! - `document`: PDF/Word download requests and results
//! - `materiality`: materiality assessment issues

pub mod auth;
pub mod document;
pub mod materiality;
pub mod tcfd;

pub use auth::{
    LoginGrant, LoginRequest, LoginResponse, RefreshResponse, SignupRequest, SignupResponse,
    UserProfile,
};
pub use document::{
    filename_from_content_disposition, DocumentFormat, DownloadRequest, DownloadedDocument,
};
pub use materiality::{MaterialityIssue, MaterialityResponse};
pub use tcfd::{
    group_by_category, FinancialData, FinancialDataResponse, FinancialTable, GenerateReportRequest,
    GenerateReportResponse, GeneratedReport, StandardsResponse, TcfdCategory, TcfdStandard,
};
