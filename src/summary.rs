//! Per-source summary derivation for the combined report.
//!
//! Producers report status as free text; it is folded into a small set of
//! canonical buckets through case-insensitive vocabulary matching. Metrics
//! from multiple candidate objects merge first-writer-wins per label, and
//! status/error/generated-at resolve to the first non-empty candidate in the
//! per-source priority order the caller supplies.

use serde_json::Value as Json;

use crate::aggregate::ReportState;
use crate::models::{Issue, ReportSource, ReportStatus, SummaryRecord};
use crate::normalize::{canonical_key, SOURCE_DIFY, SOURCE_DML_PROMPT, SOURCE_STATIC};

/// Vocabulary per status bucket, matched as case-insensitive substrings.
const SUCCESS_WORDS: &[&str] = &["complete", "done", "ok", "ready", "finish", "success", "pass"];
const ERROR_WORDS: &[&str] = &["fail", "error", "denied", "rejected", "invalid", "exception"];
const CANCELLED_WORDS: &[&str] = &["cancel", "abort"];
const PROCESSING_WORDS: &[&str] = &["pending", "progress", "running", "generat", "queue", "analyz"];
const IDLE_WORDS: &[&str] = &["idle", "wait", "standby"];

/// Fold a raw free-text status into a canonical bucket.
pub fn map_status(raw: &str) -> ReportStatus {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ReportStatus::Empty;
    }
    let lower = trimmed.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if hit(SUCCESS_WORDS) {
        ReportStatus::Success
    } else if hit(ERROR_WORDS) {
        ReportStatus::Error
    } else if hit(CANCELLED_WORDS) {
        ReportStatus::Cancelled
    } else if hit(PROCESSING_WORDS) {
        ReportStatus::Processing
    } else if hit(IDLE_WORDS) {
        ReportStatus::Idle
    } else {
        ReportStatus::Unknown
    }
}

/// Localized display label per producer bucket.
pub fn source_label(key: &str) -> String {
    match canonical_key(key).as_str() {
        "staticanalyzer" => "靜態規則引擎".to_string(),
        "difyworkflow" => "Dify 工作流審查".to_string(),
        "dmlprompt" => "AI 補充審查".to_string(),
        _ => key.to_string(),
    }
}

/// Merge metric bags first-writer-wins per (canonical) metric label.
pub fn merge_metrics(candidates: &[ReportSource]) -> serde_json::Map<String, Json> {
    let mut merged = serde_json::Map::new();
    let mut taken: Vec<String> = Vec::new();
    for candidate in candidates {
        for (label, value) in &candidate.metrics {
            let canon = canonical_key(label);
            if taken.contains(&canon) {
                continue;
            }
            taken.push(canon);
            merged.insert(label.clone(), value.clone());
        }
    }
    merged
}

fn first_non_empty<'a>(
    candidates: &'a [ReportSource],
    pick: impl Fn(&'a ReportSource) -> Option<&'a str>,
) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| pick(c).map(str::trim).filter(|s| !s.is_empty()))
        .next()
}

/// Build one summary record for `key` from its candidates and the issues
/// already attributed to it.
fn build_record(key: &str, candidates: &[ReportSource], total_issues: usize) -> SummaryRecord {
    let status = first_non_empty(candidates, |c| c.status.as_deref()).map(map_status);
    let message = match status {
        Some(ReportStatus::Success) if total_issues == 0 => Some("代碼正常".to_string()),
        _ => None,
    };
    SummaryRecord {
        source: key.to_string(),
        label: source_label(key),
        total_issues,
        status,
        generated_at: first_non_empty(candidates, |c| c.generated_at.as_deref())
            .map(str::to_string),
        error_message: first_non_empty(candidates, |c| c.error.as_deref()).map(str::to_string),
        message,
        metrics: merge_metrics(candidates),
    }
}

/// Derive the summary section: one record per producer in fixed order, with
/// `total_issues` counted from the aggregated issues attributed to each.
pub fn build_summary(state: &ReportState, issues: &[Issue]) -> Vec<SummaryRecord> {
    let mut records = Vec::new();
    for key in [SOURCE_STATIC, SOURCE_DIFY, SOURCE_DML_PROMPT] {
        let wanted = canonical_key(key);
        let candidates: &[ReportSource] = state
            .sources
            .iter()
            .find(|(k, _)| canonical_key(k) == wanted)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[]);
        let total = issues
            .iter()
            .filter(|i| {
                i.source
                    .as_deref()
                    .map(|s| canonical_key(s) == wanted)
                    .unwrap_or(false)
            })
            .count();
        if candidates.is_empty() && total == 0 {
            continue;
        }
        records.push(build_record(key, candidates, total));
    }
    records
}
