use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// One row of a double-materiality assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialityIssue {
    #[serde(default)]
    pub category: String,
    pub issue: String,
    #[serde(default)]
    pub impact_score: Option<f64>,
    #[serde(default)]
    pub financial_score: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl MaterialityIssue {
    /// Combined score used for ranking; missing scores count as zero.
    pub fn total_score(&self) -> f64 {
        self.impact_score.unwrap_or(0.0) + self.financial_score.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialityResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<MaterialityIssue>,
    pub error: Option<String>,
}

impl MaterialityResponse {
    /// Issues ranked by combined score, highest first.
    pub fn into_ranked(self) -> Result<Vec<MaterialityIssue>, ApiError> {
        if !self.success {
            return Err(ApiError::Service(
                self.error
                    .unwrap_or_else(|| "Failed to load materiality issues".to_string()),
            ));
        }
        let mut issues = self.data;
        issues.sort_by(|a, b| b.total_score().total_cmp(&a.total_score()));
        Ok(issues)
    }
}
