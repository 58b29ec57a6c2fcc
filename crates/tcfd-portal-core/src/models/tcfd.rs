use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

// ============================================================================
// Financial data
// ============================================================================

/// One table from the financial data lookup. The services return either an
/// array of row objects, a single object, or a scalar; all are kept as JSON
/// and flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialTable(pub serde_json::Value);

impl FinancialTable {
    /// Column names in first-seen order across all rows.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in self.row_objects() {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        if columns.is_empty() && !self.0.is_null() {
            columns.push("value".to_string());
        }
        columns
    }

    /// Rows as display strings, aligned with `columns()`.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let columns = self.columns();
        let objects = self.row_objects();
        if objects.is_empty() {
            return match &self.0 {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::Array(items) => {
                    items.iter().map(|v| vec![display_value(v)]).collect()
                }
                scalar => vec![vec![display_value(scalar)]],
            };
        }
        objects
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(display_value).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        match &self.0 {
            serde_json::Value::Array(items) => items.len(),
            serde_json::Value::Null => 0,
            _ => 1,
        }
    }

    fn row_objects(&self) -> Vec<&serde_json::Map<String, serde_json::Value>> {
        match &self.0 {
            serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_object()).collect(),
            serde_json::Value::Object(map) => vec![map],
            _ => Vec::new(),
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `data` object of a financial data lookup: table name to table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialData {
    pub tables: BTreeMap<String, FinancialTable>,
}

impl FinancialData {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinancialDataResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<FinancialData>,
    pub error: Option<String>,
}

impl FinancialDataResponse {
    pub fn into_result(self) -> Result<FinancialData, ApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ApiError::InvalidResponse(
                "Financial data response had no data".to_string(),
            )),
            (false, _) => Err(ApiError::Service(
                self.error
                    .unwrap_or_else(|| "Failed to load financial data".to_string()),
            )),
        }
    }
}

// ============================================================================
// TCFD standards
// ============================================================================

/// The four TCFD pillars. Unknown labels are preserved as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TcfdCategory {
    Governance,
    Strategy,
    RiskManagement,
    MetricsAndTargets,
    Other(String),
}

impl TcfdCategory {
    pub const ALL: [TcfdCategory; 4] = [
        TcfdCategory::Governance,
        TcfdCategory::Strategy,
        TcfdCategory::RiskManagement,
        TcfdCategory::MetricsAndTargets,
    ];

    pub fn label(&self) -> &str {
        match self {
            TcfdCategory::Governance => "Governance",
            TcfdCategory::Strategy => "Strategy",
            TcfdCategory::RiskManagement => "Risk Management",
            TcfdCategory::MetricsAndTargets => "Metrics & Targets",
            TcfdCategory::Other(label) => label,
        }
    }

    /// Display order; unknown categories sort last.
    pub fn order(&self) -> usize {
        match self {
            TcfdCategory::Governance => 0,
            TcfdCategory::Strategy => 1,
            TcfdCategory::RiskManagement => 2,
            TcfdCategory::MetricsAndTargets => 3,
            TcfdCategory::Other(_) => 4,
        }
    }
}

impl From<String> for TcfdCategory {
    fn from(s: String) -> Self {
        let lower = s.trim().to_lowercase();
        if lower.contains("governance") || lower.contains("거버넌스") || lower.contains("지배구조") {
            TcfdCategory::Governance
        } else if lower.contains("risk") || lower.contains("위험") || lower.contains("리스크") {
            TcfdCategory::RiskManagement
        } else if lower.contains("metric") || lower.contains("target") || lower.contains("지표") {
            TcfdCategory::MetricsAndTargets
        } else if lower.contains("strategy") || lower.contains("전략") {
            TcfdCategory::Strategy
        } else {
            TcfdCategory::Other(s)
        }
    }
}

impl From<TcfdCategory> for String {
    fn from(c: TcfdCategory) -> Self {
        c.label().to_string()
    }
}

impl fmt::Display for TcfdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcfdStandard {
    pub category: TcfdCategory,
    pub disclosure_id: String,
    #[serde(default)]
    pub disclosure_summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl TcfdStandard {
    pub fn summary(&self) -> &str {
        self.disclosure_summary
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardsResponse {
    #[serde(default)]
    pub data: Vec<TcfdStandard>,
}

/// Group standards by pillar in canonical order, keeping the service's order
/// within each pillar.
pub fn group_by_category(standards: &[TcfdStandard]) -> Vec<(TcfdCategory, Vec<&TcfdStandard>)> {
    let mut groups: Vec<(TcfdCategory, Vec<&TcfdStandard>)> = Vec::new();
    for standard in standards {
        match groups.iter_mut().find(|(c, _)| *c == standard.category) {
            Some((_, items)) => items.push(standard),
            None => groups.push((standard.category.clone(), vec![standard])),
        }
    }
    groups.sort_by_key(|(c, _)| c.order());
    groups
}

// ============================================================================
// Report generation
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReportRequest {
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_data: Option<FinancialData>,
    pub disclosure_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportResponse {
    #[serde(default)]
    pub success: bool,
    pub report_content: Option<String>,
    pub polished_content: Option<String>,
    pub error_message: Option<String>,
}

impl GenerateReportResponse {
    pub fn into_report(self, company_name: &str) -> Result<GeneratedReport, ApiError> {
        if !self.success {
            return Err(ApiError::Service(
                self.error_message
                    .unwrap_or_else(|| "Report generation failed".to_string()),
            ));
        }
        match self.report_content {
            Some(draft) if !draft.trim().is_empty() => Ok(GeneratedReport {
                company_name: company_name.to_string(),
                draft,
                polished: self.polished_content.filter(|p| !p.trim().is_empty()),
                generated_at: Utc::now(),
            }),
            _ => Err(ApiError::InvalidResponse(
                "Report generation returned no content".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub company_name: String,
    pub draft: String,
    pub polished: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedReport {
    /// The best available text: polished when present, otherwise the draft.
    pub fn best_text(&self) -> &str {
        self.polished.as_deref().unwrap_or(&self.draft)
    }
}
