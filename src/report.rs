//! Assembly of the final combined `{summary, issues}` artifact.

use serde_json::Value as Json;

use crate::aggregate::{collect_aggregated_issues, ReportState};
use crate::models::{CombinedReport, Issue};
use crate::normalize::issues_from_value;
use crate::summary::build_summary;

/// Build the combined report: aggregated issues first, then one summary
/// record per producer with `total_issues` counted from the issues
/// attributed to it at build time.
pub fn build_combined_report(state: &ReportState) -> CombinedReport {
    let issues = collect_aggregated_issues(state);
    let summary = build_summary(state, &issues);
    CombinedReport { summary, issues }
}

/// Recover issues from a persisted report blob. Unparseable text degrades
/// to an empty list, letting lower cascade tiers take over.
pub fn parsed_report_issues(text: &str) -> Vec<Issue> {
    match serde_json::from_str::<Json>(text) {
        Ok(value) => issues_from_value(&value),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportSource;
    use crate::normalize::{SOURCE_DML_PROMPT, SOURCE_STATIC};

    fn issue(msg: &str, source: &str) -> Issue {
        Issue {
            message: msg.to_string(),
            source: Some(source.to_string()),
            ..Issue::default()
        }
    }

    #[test]
    fn test_summary_counts_match_attributed_issues() {
        let mut state = ReportState {
            static_issues: vec![issue("a", SOURCE_STATIC), issue("b", SOURCE_STATIC)],
            ai_issues: vec![issue("c", SOURCE_DML_PROMPT)],
            ..ReportState::default()
        };
        state.sources.insert(
            SOURCE_STATIC.to_string(),
            vec![ReportSource {
                status: Some("success".to_string()),
                ..ReportSource::default()
            }],
        );
        let report = build_combined_report(&state);
        assert_eq!(report.issues.len(), 3);
        for record in &report.summary {
            let count = report
                .issues
                .iter()
                .filter(|i| i.source.as_deref() == Some(record.source.as_str()))
                .count();
            assert_eq!(record.total_issues, count);
        }
    }

    #[test]
    fn test_combined_issues_are_unique() {
        let state = ReportState {
            static_issues: vec![issue("dup", SOURCE_STATIC), issue("dup", SOURCE_STATIC)],
            ..ReportState::default()
        };
        let report = build_combined_report(&state);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_parsed_report_issues_degrades() {
        assert!(parsed_report_issues("not json at all").is_empty());
        let text = r#"{"summary": [], "issues": [{"message": "m", "severity": "ERROR"}]}"#;
        let issues = parsed_report_issues(text);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, "ERROR");
    }
}
