//! Review pipeline: request validation, path classification, and
//! orchestration of local/remote analysis into the combined report.
//!
//! The HTTP layer above this module is plain glue; everything it needs is
//! exposed as function calls taking the request fields of the report
//! endpoints. Requests for different (project, path) keys are independent;
//! persistence is last-write-wins and external.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::aggregate::ReportState;
use crate::error::ReviewError;
use crate::models::{AnalysisReport, CombinedReport, Issue, ReportSource, Selection};
use crate::normalize::{attribute_issue, SOURCE_DIFY, SOURCE_STATIC};
use crate::remote::WorkflowClient;
use crate::report::build_combined_report;
use crate::rules::analyse;
use crate::segmenter::{plan_segments, SegmenterConfig};

/// One report-generation request.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub project_id: String,
    pub path: String,
    pub content: String,
    pub selection: Option<Selection>,
    pub user_id: String,
}

impl ReviewRequest {
    /// Reject empty required fields before any analysis runs.
    pub fn validate(&self) -> Result<(), ReviewError> {
        for (field, value) in [
            ("projectId", &self.project_id),
            ("path", &self.path),
            ("content", &self.content),
        ] {
            if value.trim().is_empty() {
                return Err(ReviewError::Input(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Which analyzer is primary for a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    RuleEngine,
    RemoteWorkflow,
}

/// `.sql` (case-insensitive) selects the local rule engine; everything else
/// routes to the remote workflow.
pub fn classify_path(path: &str) -> Analyzer {
    let lower = path.to_lowercase();
    if lower.ends_with(".sql") {
        Analyzer::RuleEngine
    } else {
        Analyzer::RemoteWorkflow
    }
}

/// Run the rule engine and attribute its issues to the static analyzer
/// bucket.
pub fn run_static_analysis(content: &str) -> (AnalysisReport, Vec<Issue>) {
    let report = analyse(content);
    let attributed = report
        .issues
        .iter()
        .map(|i| attribute_issue(i, SOURCE_STATIC, false))
        .collect();
    (report, attributed)
}

/// Generate the combined report for one request.
///
/// `.sql` content is analyzed locally; other content is segmented and sent
/// through the remote workflow (a missing client is a configuration error
/// for that route). Remote failures abort the run and surface as errors per
/// the taxonomy; the local route cannot fail after validation.
pub fn run_review(
    request: &ReviewRequest,
    segmenter: &SegmenterConfig,
    client: Option<&WorkflowClient>,
) -> Result<CombinedReport, ReviewError> {
    request.validate()?;
    let generated_at = Utc::now().to_rfc3339();
    let mut state = ReportState::default();

    match classify_path(&request.path) {
        Analyzer::RuleEngine => {
            let (report, attributed) = run_static_analysis(&request.content);
            info!(
                path = request.path.as_str(),
                issues = attributed.len(),
                "static analysis finished"
            );
            state.static_issues = attributed;
            let mut metrics = serde_json::Map::new();
            metrics.insert("file_extension".to_string(), json!(".sql"));
            metrics.insert("total_issues".to_string(), json!(report.issues.len()));
            state.sources.insert(
                SOURCE_STATIC.to_string(),
                vec![ReportSource {
                    status: Some("success".to_string()),
                    generated_at: Some(generated_at),
                    metrics,
                    ..ReportSource::default()
                }],
            );
        }
        Analyzer::RemoteWorkflow => {
            let client = client.ok_or_else(|| {
                ReviewError::Configuration(
                    "remote workflow endpoint is not configured".to_string(),
                )
            })?;
            let segments = plan_segments(&request.content, segmenter);
            info!(
                path = request.path.as_str(),
                segments = segments.len(),
                "dispatching segments to remote workflow"
            );
            let outcome = client.review_segments(
                &request.project_id,
                &request.path,
                &request.user_id,
                request.selection.as_ref(),
                &segments,
            )?;
            state.workflow_issues = outcome
                .issues
                .iter()
                .map(|i| attribute_issue(i, SOURCE_DIFY, false))
                .collect();
            let mut metrics = serde_json::Map::new();
            metrics.insert("segments".to_string(), json!(outcome.segments));
            if let Some(ref id) = outcome.conversation_id {
                metrics.insert("conversation_id".to_string(), json!(id));
            }
            state.sources.insert(
                SOURCE_DIFY.to_string(),
                vec![ReportSource {
                    status: Some("success".to_string()),
                    generated_at: Some(generated_at),
                    metrics,
                    ..ReportSource::default()
                }],
            );
        }
    }

    Ok(build_combined_report(&state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, content: &str) -> ReviewRequest {
        ReviewRequest {
            project_id: "demo".to_string(),
            path: path.to_string(),
            content: content.to_string(),
            selection: None,
            user_id: "tester".to_string(),
        }
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut req = request("a.sql", "SELECT 1;");
        req.project_id = " ".to_string();
        assert!(matches!(
            run_review(&req, &SegmenterConfig::default(), None),
            Err(ReviewError::Input(_))
        ));
        let mut req = request("a.sql", "SELECT 1;");
        req.content = String::new();
        assert!(matches!(req.validate(), Err(ReviewError::Input(_))));
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify_path("etl/load.sql"), Analyzer::RuleEngine);
        assert_eq!(classify_path("etl/LOAD.SQL"), Analyzer::RuleEngine);
        assert_eq!(classify_path("report.py"), Analyzer::RemoteWorkflow);
        assert_eq!(classify_path("noext"), Analyzer::RemoteWorkflow);
    }

    #[test]
    fn test_sql_route_builds_attributed_report() {
        let req = request("etl/load.sql", "DELETE FROM T_ORDERS;");
        let report = run_review(&req, &SegmenterConfig::default(), None).unwrap();
        assert!(!report.issues.is_empty());
        for issue in &report.issues {
            assert_eq!(issue.source.as_deref(), Some(SOURCE_STATIC));
        }
        let record = report
            .summary
            .iter()
            .find(|r| r.source == SOURCE_STATIC)
            .unwrap();
        assert_eq!(record.total_issues, report.issues.len());
        assert!(record.generated_at.is_some());
    }

    #[test]
    fn test_remote_route_without_client_is_config_error() {
        let req = request("script.py", "print(1)");
        assert!(matches!(
            run_review(&req, &SegmenterConfig::default(), None),
            Err(ReviewError::Configuration(_))
        ));
    }

    #[test]
    fn test_clean_sql_yields_empty_issue_list() {
        let req = request("etl/load.sql", "SELECT * FROM T_A WHERE ID = 1;");
        let report = run_review(&req, &SegmenterConfig::default(), None).unwrap();
        assert!(report.issues.is_empty());
        let record = report
            .summary
            .iter()
            .find(|r| r.source == SOURCE_STATIC)
            .unwrap();
        assert_eq!(record.total_issues, 0);
        assert_eq!(record.message.as_deref(), Some("代碼正常"));
    }
}
