//! Producer-key canonicalization and issue normalization.
//!
//! Producers spell the same logical fields many ways (`rule_id`/`ruleId`/
//! `rule`, `severity`/`level`, ...) and one legacy producer bundles several
//! findings into a single record with aligned parallel arrays. Everything
//! entering the aggregation layer passes through the normalization
//! constructor here; call sites never duck-type raw records themselves.

use serde_json::Value as Json;

use crate::models::{Column, Issue};

/// Producer key of the local rule engine.
pub const SOURCE_STATIC: &str = "static_analyzer";
/// Producer key of the supplementary AI review pass.
pub const SOURCE_DML_PROMPT: &str = "dml_prompt";
/// Producer key of the remote multi-turn workflow.
pub const SOURCE_DIFY: &str = "dify_workflow";

/// Strip non-alphanumerics and lowercase, so `static_analyzer`,
/// `staticAnalyzer`, and `STATIC-ANALYZER` collapse to one key.
pub fn canonical_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Re-tag an issue with `target_key`.
///
/// With `force`, the source is overwritten unconditionally and duplicate
/// `analysis_source`/`analysisSource` fields are dropped. Without it, an
/// issue that declares a canonically-matching source stays unchanged, an
/// issue with no source gets `target_key` attached, and an issue declaring
/// a different producer is left untouched so a merge cannot mis-attribute
/// findings that legitimately belong elsewhere.
pub fn attribute_issue(issue: &Issue, target_key: &str, force: bool) -> Issue {
    let mut out = issue.clone();
    if force {
        out.source = Some(target_key.to_string());
        out.extra.remove("analysis_source");
        out.extra.remove("analysisSource");
        return out;
    }
    match issue.source.as_deref() {
        Some(declared) if canonical_key(declared) == canonical_key(target_key) => out,
        Some(_) => out,
        None => {
            out.source = Some(target_key.to_string());
            out
        }
    }
}

/// Field names consumed by the normalization constructor, in resolution
/// order per logical field.
const RULE_ID_KEYS: &[&str] = &["rule_id", "ruleId", "rule"];
const SEVERITY_KEYS: &[&str] = &["severity", "level", "severity_level"];
const MESSAGE_KEYS: &[&str] = &["message", "msg", "description"];
const OBJECT_KEYS: &[&str] = &["object", "objectName", "object_name"];
const LINE_KEYS: &[&str] = &["line", "line_number", "lineNumber"];
const COLUMN_KEYS: &[&str] = &["column", "col"];
const SOURCE_KEYS: &[&str] = &["source", "analysis_source", "analysisSource"];

fn first_string(map: &serde_json::Map<String, Json>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        map.get(*k)
            .and_then(Json::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn first_u32(map: &serde_json::Map<String, Json>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Json::as_u64))
        .map(|n| n as u32)
}

fn as_column(value: &Json) -> Option<Column> {
    match value {
        Json::Number(n) => n.as_u64().map(|n| Column::One(n as u32)),
        Json::Array(items) => {
            let cols: Vec<u32> = items
                .iter()
                .filter_map(|v| v.as_u64().map(|n| n as u32))
                .collect();
            if cols.is_empty() {
                None
            } else {
                Some(Column::Many(cols))
            }
        }
        _ => None,
    }
}

fn string_array(map: &serde_json::Map<String, Json>, key: &str) -> Option<Vec<String>> {
    map.get(key).and_then(Json::as_array).map(|items| {
        items
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect()
    })
}

/// Normalize one raw producer record into typed issues.
///
/// A record carrying parallel arrays (`rule_ids[]`, `severity_levels[]`,
/// `issues[]`, aligned `column[]`/`evidence_list[]`/`recommendation[]`)
/// expands into one issue per aligned tuple; everything else yields at most
/// one issue. Malformed input degrades to an empty list.
pub fn normalize_issue_record(record: &Json) -> Vec<Issue> {
    let map = match record {
        Json::Object(map) => map,
        Json::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            return vec![Issue {
                message: trimmed.to_string(),
                ..Issue::default()
            }];
        }
        _ => return Vec::new(),
    };

    let base = base_issue(map);

    let rule_ids = string_array(map, "rule_ids");
    let severities = string_array(map, "severity_levels");
    let messages = string_array(map, "issues");
    let evidences = string_array(map, "evidence_list");
    let recommendations = string_array(map, "recommendation");
    let columns: Option<Vec<u32>> = map.get("column").and_then(Json::as_array).map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_u64().map(|n| n as u32))
            .collect()
    });

    let bundled = rule_ids.is_some() || severities.is_some() || messages.is_some();
    if !bundled {
        return vec![base];
    }

    let count = [
        rule_ids.as_ref().map(Vec::len),
        severities.as_ref().map(Vec::len),
        messages.as_ref().map(Vec::len),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(0);
    if count == 0 {
        return vec![base];
    }

    let pick = |list: &Option<Vec<String>>, i: usize| -> Option<String> {
        list.as_ref()
            .and_then(|v| v.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    (0..count)
        .map(|i| {
            let mut issue = base.clone();
            if let Some(rule) = pick(&rule_ids, i) {
                issue.rule_id = Some(rule);
            }
            if let Some(sev) = pick(&severities, i) {
                issue.severity = sev;
            }
            if let Some(msg) = pick(&messages, i) {
                issue.message = msg;
            }
            if let Some(ev) = pick(&evidences, i) {
                issue.evidence = Some(ev);
            }
            if let Some(cols) = columns.as_ref() {
                if let Some(col) = cols.get(i) {
                    issue.column = Some(Column::One(*col));
                }
            }
            if let Some(rec) = pick(&recommendations, i) {
                issue
                    .extra
                    .insert("recommendation".to_string(), Json::String(rec));
            }
            issue
        })
        .collect()
}

/// Single-issue view of a record: explicit, ordered first-match resolution
/// of alternate field names.
fn base_issue(map: &serde_json::Map<String, Json>) -> Issue {
    let consumed: &[&str] = &[
        "rule_id",
        "ruleId",
        "rule",
        "severity",
        "level",
        "severity_level",
        "message",
        "msg",
        "description",
        "object",
        "objectName",
        "object_name",
        "line",
        "line_number",
        "lineNumber",
        "column",
        "col",
        "snippet",
        "evidence",
        "source",
        "analysis_source",
        "analysisSource",
        "details",
        "rule_ids",
        "severity_levels",
        "issues",
        "evidence_list",
        "recommendation",
    ];

    let mut issue = Issue {
        rule_id: first_string(map, RULE_ID_KEYS),
        message: first_string(map, MESSAGE_KEYS).unwrap_or_default(),
        object: first_string(map, OBJECT_KEYS),
        line: first_u32(map, LINE_KEYS),
        column: COLUMN_KEYS.iter().find_map(|k| map.get(*k).and_then(as_column)),
        snippet: first_string(map, &["snippet"]),
        evidence: first_string(map, &["evidence"]),
        source: first_string(map, SOURCE_KEYS),
        details: map
            .get("details")
            .and_then(Json::as_array)
            .map(|v| v.to_vec()),
        ..Issue::default()
    };
    if let Some(sev) = first_string(map, SEVERITY_KEYS) {
        issue.severity = sev;
    }
    for (k, v) in map {
        if !consumed.contains(&k.as_str()) {
            issue.extra.insert(k.clone(), v.clone());
        }
    }
    issue
}

/// Extract issues from any of the payload shapes producers hand back: a
/// bare array, an `{issues: [...]}` object, or a JSON string of either.
/// Anything else degrades to an empty list.
pub fn issues_from_value(value: &Json) -> Vec<Issue> {
    match value {
        Json::Array(items) => items.iter().flat_map(normalize_issue_record).collect(),
        Json::Object(map) => map
            .get("issues")
            .and_then(Json::as_array)
            .map(|items| items.iter().flat_map(normalize_issue_record).collect())
            .unwrap_or_default(),
        Json::String(text) => serde_json::from_str::<Json>(text)
            .map(|parsed| issues_from_value(&parsed))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
