//! Shared data models for analysis output, segmentation, and reports.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

fn default_severity() -> String {
    "unlabeled".to_string()
}

/// Column position(s) of an issue: a single column or the aligned column
/// list of a bundled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    One(u32),
    Many(Vec<u32>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One structured diagnostic finding.
///
/// `source` names the producer (`static_analyzer`, `dml_prompt`,
/// `dify_workflow`); after normalization every issue carries exactly one.
/// Unknown producer fields survive round-trips through `extra`.
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Bundled sub-findings attached by some producers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Json>>,
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, Json>,
}

impl Default for Issue {
    fn default() -> Self {
        Self {
            rule_id: None,
            severity: default_severity(),
            message: String::new(),
            object: None,
            line: None,
            column: None,
            snippet: None,
            evidence: None,
            source: None,
            details: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A bounded slice of source content sized for the remote analyzer.
pub struct Segment {
    /// 1-based position within the plan.
    pub index: usize,
    /// Total number of segments in the plan.
    pub total: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

/// Canonical report status buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
    Cancelled,
    Processing,
    Idle,
    Unknown,
    Empty,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Error => "error",
            ReportStatus::Cancelled => "cancelled",
            ReportStatus::Processing => "processing",
            ReportStatus::Idle => "idle",
            ReportStatus::Unknown => "unknown",
            ReportStatus::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Raw per-producer report state as persisted or observed during a run.
pub struct ReportSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: serde_json::Map<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Derived per-producer summary line of the combined report.
pub struct SummaryRecord {
    pub source: String,
    pub label: String,
    pub total_issues: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: serde_json::Map<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The persisted/exported combined artifact.
pub struct CombinedReport {
    pub summary: Vec<SummaryRecord>,
    pub issues: Vec<Issue>,
}

/// Summary block of a single-engine analysis report: a plain text verdict
/// when nothing fired, otherwise counters keyed by rule id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisSummary {
    Stats {
        total_issues: usize,
        by_rule: serde_json::Map<String, Json>,
    },
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Output of one rule-engine run.
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub issues: Vec<Issue>,
}

impl AnalysisReport {
    /// Count of issues with an error-class severity, for exit codes.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity.eq_ignore_ascii_case("error"))
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// An optional line/column selection accompanying a review request.
pub struct Selection {
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}
