use tracing::warn;

use crate::api::ApiClient;
use crate::models::MaterialityIssue;

use super::{required, ActionError, RequestGate, ValidationError};

#[derive(Debug, Clone)]
pub struct MaterialityTicket {
    pub generation: u64,
    company_name: String,
}

#[derive(Debug)]
pub struct MaterialityOutcome {
    pub generation: u64,
    pub company_name: String,
    pub result: Result<Vec<MaterialityIssue>, ActionError>,
}

/// Materiality assessment table for one company.
#[derive(Debug, Default)]
pub struct MaterialityTable {
    pub company_name: String,
    pub loaded_company: Option<String>,
    /// Highest total score first.
    pub issues: Vec<MaterialityIssue>,
    pub error: Option<String>,
    gate: RequestGate,
}

impl MaterialityTable {
    pub fn is_loading(&self) -> bool {
        self.gate.in_flight()
    }

    pub fn begin(&mut self) -> Result<MaterialityTicket, ValidationError> {
        let company_name = match required(&self.company_name, "Company name") {
            Ok(name) => name.to_string(),
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };
        self.error = None;
        Ok(MaterialityTicket {
            generation: self.gate.issue(),
            company_name,
        })
    }

    pub async fn run(api: &ApiClient, ticket: MaterialityTicket) -> MaterialityOutcome {
        let result = api
            .materiality_issues(&ticket.company_name)
            .await
            .map_err(ActionError::from);
        MaterialityOutcome {
            generation: ticket.generation,
            company_name: ticket.company_name,
            result,
        }
    }

    /// Apply an outcome. Returns false when it was discarded as stale.
    pub fn complete(&mut self, outcome: MaterialityOutcome) -> bool {
        if !self.gate.settle(outcome.generation) {
            return false;
        }
        match outcome.result {
            Ok(issues) => {
                self.issues = issues;
                self.loaded_company = Some(outcome.company_name);
                self.error = None;
            }
            Err(e) => {
                warn!(company = %outcome.company_name, error = %e, "Materiality fetch failed");
                self.error = Some(e.user_message());
            }
        }
        true
    }

    /// Show cached issues while a fresh request runs.
    pub fn show_cached(&mut self, company_name: &str, issues: Vec<MaterialityIssue>) {
        self.issues = issues;
        self.loaded_company = Some(company_name.to_string());
    }

    /// Drop everything loaded and cancel the request in flight.
    pub fn clear(&mut self) {
        self.gate.cancel();
        *self = Self {
            gate: self.gate.clone(),
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::testing::{json_response, status_response, Harness};
    use serde_json::json;

    fn issues_body(names: &[(&str, f64)]) -> serde_json::Value {
        let data: Vec<_> = names
            .iter()
            .map(|(issue, score)| json!({"category": "Environment", "issue": issue, "impact_score": score}))
            .collect();
        json!({"success": true, "data": data})
    }

    #[tokio::test]
    async fn test_loads_ranked_issues() {
        let h = Harness::new(true);
        h.session.login("alice", UserProfile::new("alice"), "tok").unwrap();
        h.respond(json_response(200, issues_body(&[("Water", 1.0), ("Climate", 5.0)])));

        let mut table = MaterialityTable {
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        let ticket = table.begin().unwrap();
        assert!(table.is_loading());
        assert!(table.complete(MaterialityTable::run(&h.api, ticket).await));

        assert_eq!(table.loaded_company.as_deref(), Some("Acme"));
        let names: Vec<_> = table.issues.iter().map(|i| i.issue.as_str()).collect();
        assert_eq!(names, vec!["Climate", "Water"]);
    }

    #[tokio::test]
    async fn test_error_keeps_existing_issues() {
        let h = Harness::new(true);
        h.respond(json_response(200, issues_body(&[("Water", 1.0)])))
            .respond(status_response(502));

        let mut table = MaterialityTable {
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        let ticket = table.begin().unwrap();
        table.complete(MaterialityTable::run(&h.api, ticket).await);

        table.company_name = "Other".to_string();
        let ticket = table.begin().unwrap();
        assert!(table.complete(MaterialityTable::run(&h.api, ticket).await));

        assert_eq!(table.issues.len(), 1);
        assert_eq!(table.loaded_company.as_deref(), Some("Acme"));
        assert!(table.error.is_some());
    }

    #[tokio::test]
    async fn test_stale_outcome_is_ignored() {
        let h = Harness::new(true);
        h.respond(json_response(200, issues_body(&[("Old", 1.0)])))
            .respond(json_response(200, issues_body(&[("New", 1.0)])));

        let mut table = MaterialityTable {
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        let first = table.begin().unwrap();
        let second = table.begin().unwrap();
        let first = MaterialityTable::run(&h.api, first).await;
        let second = MaterialityTable::run(&h.api, second).await;

        assert!(table.complete(second));
        assert!(!table.complete(first));
        assert_eq!(table.issues[0].issue, "New");
    }

    #[tokio::test]
    async fn test_clear_discards_request_in_flight() {
        let h = Harness::new(true);
        h.respond(json_response(200, issues_body(&[("Water", 1.0)])));

        let mut table = MaterialityTable {
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        table.show_cached("Acme", Vec::new());
        let ticket = table.begin().unwrap();
        table.clear();
        assert!(!table.is_loading());
        assert!(table.loaded_company.is_none());
        assert!(table.company_name.is_empty());

        let outcome = MaterialityTable::run(&h.api, ticket).await;
        assert!(!table.complete(outcome));
        assert!(table.issues.is_empty());
    }

    #[test]
    fn test_blank_company_rejected() {
        let mut table = MaterialityTable::default();
        assert!(table.begin().is_err());
        assert_eq!(table.error.as_deref(), Some("Company name is required"));
        assert!(!table.is_loading());
    }
}
