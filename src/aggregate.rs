//! Cross-source issue aggregation and exact-duplicate removal.
//!
//! Persisted state is frequently partial (the remote workflow failed while
//! the local engine succeeded, or only stale snapshots exist), so the
//! aggregator is an explicit ordered list of strategies evaluated
//! top-to-bottom until one yields a non-empty result. Nothing in this module
//! fails: malformed or missing inputs degrade to empty collections.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value as Json;

use crate::models::{Issue, ReportSource};
use crate::normalize::{attribute_issue, SOURCE_STATIC};

/// Recursively sort object keys (arrays keep their order) and serialize,
/// producing the canonical identity of a JSON value.
pub fn canonical_string(value: &Json) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Json) -> Json {
    match value {
        Json::Object(map) => {
            let mut entries: Vec<(&String, &Json)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Json::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Json::Array(items) => Json::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Drop later exact duplicates, preserving first-seen order. Two issues
/// differing only in key order are duplicates; differing by any field value
/// they are distinct.
pub fn dedupe_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(issues.len());
    for issue in issues {
        let key = serde_json::to_value(&issue)
            .map(|v| canonical_string(&v))
            .unwrap_or_default();
        if seen.insert(key) {
            out.push(issue);
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
/// Everything known about one (project, path) analysis at build time.
pub struct ReportState {
    /// Current-run rule engine issues.
    pub static_issues: Vec<Issue>,
    /// Current-run supplementary AI review issues.
    pub ai_issues: Vec<Issue>,
    /// Current-run remote workflow issues.
    pub workflow_issues: Vec<Issue>,
    /// Issues recovered from a previously parsed combined report.
    pub parsed_report_issues: Vec<Issue>,
    /// Raw stored rule-engine snapshot.
    pub static_snapshot: Vec<Issue>,
    /// Raw stored AI-review snapshot.
    pub ai_snapshot: Vec<Issue>,
    /// Per-producer report state candidates, in per-source priority order.
    pub sources: BTreeMap<String, Vec<ReportSource>>,
}

type Strategy = fn(&ReportState) -> Option<Vec<Issue>>;

fn non_empty(issues: Vec<Issue>) -> Option<Vec<Issue>> {
    if issues.is_empty() {
        None
    } else {
        Some(issues)
    }
}

fn tier_live_static_and_ai(state: &ReportState) -> Option<Vec<Issue>> {
    let merged: Vec<Issue> = state
        .static_issues
        .iter()
        .chain(state.ai_issues.iter())
        .cloned()
        .collect();
    non_empty(dedupe_issues(merged))
}

fn tier_workflow_as_static(state: &ReportState) -> Option<Vec<Issue>> {
    let merged: Vec<Issue> = state
        .workflow_issues
        .iter()
        .map(|i| attribute_issue(i, SOURCE_STATIC, true))
        .chain(state.ai_issues.iter().cloned())
        .collect();
    non_empty(dedupe_issues(merged))
}

fn tier_parsed_report(state: &ReportState) -> Option<Vec<Issue>> {
    non_empty(
        state
            .parsed_report_issues
            .iter()
            .map(|i| attribute_issue(i, SOURCE_STATIC, true))
            .collect(),
    )
}

fn tier_static_snapshot(state: &ReportState) -> Option<Vec<Issue>> {
    non_empty(state.static_snapshot.clone())
}

fn tier_ai_snapshot(state: &ReportState) -> Option<Vec<Issue>> {
    non_empty(state.ai_snapshot.clone())
}

/// The graceful-degradation cascade, tried top-to-bottom until a tier
/// yields issues.
const STRATEGIES: &[Strategy] = &[
    tier_live_static_and_ai,
    tier_workflow_as_static,
    tier_parsed_report,
    tier_static_snapshot,
    tier_ai_snapshot,
];

/// Merge issue lists across sources with the fallback cascade.
pub fn collect_aggregated_issues(state: &ReportState) -> Vec<Issue> {
    for strategy in STRATEGIES {
        if let Some(issues) = strategy(state) {
            return issues;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{SOURCE_DIFY, SOURCE_DML_PROMPT};
    use serde_json::json;

    fn issue(msg: &str, source: Option<&str>) -> Issue {
        Issue {
            message: msg.to_string(),
            source: source.map(str::to_string),
            ..Issue::default()
        }
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let issues = vec![issue("a", None), issue("b", None), issue("a", None)];
        let out = dedupe_issues(issues);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].message, "a");
        assert_eq!(out[1].message, "b");
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let issues = vec![issue("a", None), issue("a", None), issue("b", None)];
        let once = dedupe_issues(issues);
        let twice = dedupe_issues(once.clone());
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn test_dedupe_ignores_key_order() {
        let mut a = issue("same", None);
        a.extra.insert("x".into(), json!(1));
        a.extra.insert("y".into(), json!(2));
        let mut b = issue("same", None);
        b.extra.insert("y".into(), json!(2));
        b.extra.insert("x".into(), json!(1));
        assert_eq!(dedupe_issues(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_dedupe_keeps_value_differences() {
        let a = issue("msg", Some(SOURCE_STATIC));
        let b = issue("msg", Some(SOURCE_DIFY));
        assert_eq!(dedupe_issues(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_cascade_prefers_live_issues_over_fallbacks() {
        let state = ReportState {
            static_issues: vec![issue("s1", Some(SOURCE_STATIC))],
            ai_issues: vec![issue("a1", Some(SOURCE_DML_PROMPT))],
            workflow_issues: vec![issue("w1", Some(SOURCE_DIFY))],
            parsed_report_issues: vec![issue("p1", None)],
            static_snapshot: vec![issue("snap1", None)],
            ai_snapshot: vec![issue("snap2", None)],
            ..ReportState::default()
        };
        let out = collect_aggregated_issues(&state);
        let messages: Vec<&str> = out.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["s1", "a1"]);
    }

    #[test]
    fn test_cascade_reattributes_workflow_when_live_empty() {
        let state = ReportState {
            workflow_issues: vec![issue("w1", Some(SOURCE_DIFY))],
            static_snapshot: vec![issue("snap", None)],
            ..ReportState::default()
        };
        let out = collect_aggregated_issues(&state);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, "w1");
        assert_eq!(out[0].source.as_deref(), Some(SOURCE_STATIC));
    }

    #[test]
    fn test_cascade_falls_through_to_parsed_report() {
        let state = ReportState {
            parsed_report_issues: vec![issue("p1", Some(SOURCE_DIFY))],
            ai_snapshot: vec![issue("snap", None)],
            ..ReportState::default()
        };
        let out = collect_aggregated_issues(&state);
        assert_eq!(out[0].message, "p1");
        assert_eq!(out[0].source.as_deref(), Some(SOURCE_STATIC));
    }

    #[test]
    fn test_cascade_snapshot_tiers_in_order() {
        let state = ReportState {
            static_snapshot: vec![issue("s-snap", None)],
            ai_snapshot: vec![issue("a-snap", None)],
            ..ReportState::default()
        };
        assert_eq!(collect_aggregated_issues(&state)[0].message, "s-snap");

        let state = ReportState {
            ai_snapshot: vec![issue("a-snap", None)],
            ..ReportState::default()
        };
        assert_eq!(collect_aggregated_issues(&state)[0].message, "a-snap");
    }

    #[test]
    fn test_cascade_empty_state_degrades_to_empty() {
        assert!(collect_aggregated_issues(&ReportState::default()).is_empty());
    }

    #[test]
    fn test_canonical_string_sorts_nested_keys() {
        let a = json!({"b": {"y": 1, "x": [3, 1, 2]}, "a": true});
        let b = json!({"a": true, "b": {"x": [3, 1, 2], "y": 1}});
        assert_eq!(canonical_string(&a), canonical_string(&b));
        // array order still matters
        let c = json!({"a": true, "b": {"x": [1, 2, 3], "y": 1}});
        assert_ne!(canonical_string(&a), canonical_string(&c));
    }
}
