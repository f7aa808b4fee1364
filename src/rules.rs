//! SQL rule engine: ordered text-pattern checks over masked SQL.
//!
//! Rules scan the masked text (comments and string literals blanked) so they
//! cannot fire inside literals; snippets and evidence are extracted from the
//! original text at the matched offsets. The engine is pure and synchronous,
//! and never fails on well-formed input.

use regex::Regex;
use serde_json::Value as Json;

use crate::mask::mask_comments_and_strings;
use crate::models::{AnalysisReport, AnalysisSummary, Column, Issue};
use crate::position::{line_snippet, offset_to_line_col, truncate_chars, SNIPPET_MAX_LEN};

/// Evidence strings are capped at this many characters.
const EVIDENCE_MAX_LEN: usize = 300;

/// Compiled rule patterns. Built once per `analyse` call; all patterns are
/// fixed literals.
struct RulePatterns {
    cjk: Regex,
    create_table: Regex,
    create_view: Regex,
    create_proc: Regex,
    create_func: Regex,
    delete_from: Regex,
    where_kw: Regex,
    from_kw: Regex,
    from_boundary: Regex,
    join_kw: Regex,
    join_boundary: Regex,
    join_condition: Regex,
    lowercase: Regex,
    create_trigger: Regex,
}

impl RulePatterns {
    fn new() -> Self {
        let rx = |pat: &str| Regex::new(pat).expect("valid rule pattern");
        Self {
            cjk: rx(
                "[\u{3400}-\u{4DBF}\u{4E00}-\u{9FFF}\u{F900}-\u{FAFF}\u{3040}-\u{30FF}\u{AC00}-\u{D7AF}]",
            ),
            create_table: rx(
                r#"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([`"\[\]\w.$#@]+)"#,
            ),
            create_view: rx(r#"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?VIEW\s+([`"\[\]\w.$#@]+)"#),
            create_proc: rx(
                r#"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?PROCEDURE\s+([`"\[\]\w.$#@]+)"#,
            ),
            create_func: rx(
                r#"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\s+([`"\[\]\w.$#@]+)"#,
            ),
            delete_from: rx(r#"(?i)\bDELETE\s+FROM\s+([`"\[\]\w.$#@]+)([^;]*)"#),
            where_kw: rx(r"(?i)\bWHERE\b"),
            from_kw: rx(r"(?i)\bFROM\b"),
            from_boundary: rx(r"(?i)\bWHERE\b|\bGROUP\b|\bORDER\b|\bHAVING\b|\bLIMIT\b|;"),
            join_kw: rx(r"(?i)\bJOIN\b"),
            join_boundary: rx(
                r"(?i)\bJOIN\b|\bWHERE\b|\bGROUP\b|\bORDER\b|\bHAVING\b|\bLIMIT\b|;",
            ),
            join_condition: rx(r"(?i)\bON\b|\bUSING\b|\bNATURAL\b|\bCROSS\b"),
            lowercase: rx("[a-z]"),
            create_trigger: rx(r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?TRIGGER\b"),
        }
    }
}

/// Run all rules against `sql` and build the per-engine report.
pub fn analyse(sql: &str) -> AnalysisReport {
    let patterns = RulePatterns::new();
    let masked = mask_comments_and_strings(sql);
    let mut issues: Vec<Issue> = Vec::new();

    check_cjk(sql, &masked, &patterns, &mut issues);
    check_naming_prefixes(sql, &masked, &patterns, &mut issues);
    check_delete_full_table(sql, &masked, &patterns, &mut issues);
    check_cartesian(sql, &masked, &patterns, &mut issues);
    check_lowercase(sql, &masked, &patterns, &mut issues);
    check_no_trigger(sql, &masked, &patterns, &mut issues);

    build_report(issues)
}

/// JSON-boundary wrapper: non-string input degrades to an informational
/// payload instead of failing.
pub fn analyse_value(value: &Json) -> AnalysisReport {
    match value.as_str() {
        Some(sql) => analyse(sql),
        None => AnalysisReport {
            summary: AnalysisSummary::Text("輸入不是字符串。".to_string()),
            issues: Vec::new(),
        },
    }
}

fn build_report(issues: Vec<Issue>) -> AnalysisReport {
    if issues.is_empty() {
        return AnalysisReport {
            summary: AnalysisSummary::Text("代碼正常".to_string()),
            issues,
        };
    }
    let mut by_rule = serde_json::Map::new();
    for issue in &issues {
        if let Some(rule) = issue.rule_id.as_deref() {
            let counter = by_rule.entry(rule.to_string()).or_insert(Json::from(0u64));
            if let Some(n) = counter.as_u64() {
                *counter = Json::from(n + 1);
            }
        }
    }
    AnalysisReport {
        summary: AnalysisSummary::Stats {
            total_issues: issues.len(),
            by_rule,
        },
        issues,
    }
}

#[allow(clippy::too_many_arguments)]
fn push_issue(
    issues: &mut Vec<Issue>,
    sql: &str,
    rule_id: &str,
    message: String,
    pos: usize,
    evidence: Option<String>,
    severity: &str,
    object: Option<String>,
) {
    let (line, col) = offset_to_line_col(sql, pos);
    let snippet = line_snippet(sql, pos, SNIPPET_MAX_LEN);
    let evidence = evidence.filter(|e| !e.is_empty()).unwrap_or_else(|| snippet.clone());
    issues.push(Issue {
        rule_id: Some(rule_id.to_string()),
        severity: severity.to_string(),
        message,
        object,
        line: Some(line),
        column: Some(Column::One(col)),
        snippet: Some(snippet),
        evidence: Some(truncate_chars(&evidence, EVIDENCE_MAX_LEN)),
        ..Issue::default()
    });
}

/// Strip schema qualifiers and bracket/backtick/quote delimiters from a
/// captured name token.
fn last_identifier(token: &str) -> String {
    let mut token = token.trim();
    if let Some(pos) = token.rfind('.') {
        token = &token[pos + 1..];
    }
    if token.starts_with('[') && token.ends_with(']') && token.len() >= 2 {
        token = &token[1..token.len() - 1];
    }
    token.trim_matches(|c| c == '`' || c == '"').to_string()
}

/// R1: object names must avoid CJK/Hangul/Kana characters. First occurrence
/// only.
fn check_cjk(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    if let Some(m) = patterns.cjk.find(masked) {
        let ch = &sql[m.start()..m.end()];
        push_issue(
            issues,
            sql,
            "R1_CJK_NAME",
            "檢測到中文/非 ASCII 字符（疑似用於對象/欄位命名），請改用英文命名。".to_string(),
            m.start(),
            Some(format!("...{}...", ch)),
            "ERROR",
            None,
        );
    }
}

/// R2/R3: enforce `T_`/`V_`/`P_`/`F_` object prefixes and reject the
/// forbidden `TMP_TMP_TMP` triple-temp table prefix.
fn check_naming_prefixes(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    for caps in patterns.create_table.captures_iter(masked) {
        let whole = caps.get(0).expect("match");
        let name = last_identifier(caps.get(1).expect("name group").as_str());
        let evidence = sql[whole.range()].to_string();
        if !name.to_uppercase().starts_with("T_") {
            push_issue(
                issues,
                sql,
                "R2_PREFIX_TABLE",
                format!("表名需以 T_ 開頭：發現 {}", name),
                whole.start(),
                Some(evidence.clone()),
                "ERROR",
                Some(name.clone()),
            );
        }
        if name.to_uppercase().starts_with("TMP_TMP_TMP") {
            push_issue(
                issues,
                sql,
                "R3_TMP_TRIPLE",
                format!("臨時表命名不得使用 TMP_TMP_TMP 前綴：發現 {}", name),
                whole.start(),
                Some(evidence),
                "ERROR",
                Some(name),
            );
        }
    }

    let prefix_rules = [
        (&patterns.create_view, "V_", "R2_PREFIX_VIEW", "視圖名需以 V_ 開頭：發現 {}"),
        (&patterns.create_proc, "P_", "R2_PREFIX_PROC", "存儲過程需以 P_ 開頭：發現 {}"),
        (&patterns.create_func, "F_", "R2_PREFIX_FUNC", "函數名需以 F_ 開頭：發現 {}"),
    ];
    for (re, prefix, rule_id, template) in prefix_rules {
        for caps in re.captures_iter(masked) {
            let whole = caps.get(0).expect("match");
            let name = last_identifier(caps.get(1).expect("name group").as_str());
            if !name.to_uppercase().starts_with(prefix) {
                push_issue(
                    issues,
                    sql,
                    rule_id,
                    template.replacen("{}", &name, 1),
                    whole.start(),
                    Some(sql[whole.range()].to_string()),
                    "ERROR",
                    Some(name),
                );
            }
        }
    }
}

/// R4: `DELETE FROM` without `WHERE` before the statement terminator is a
/// full-table delete; `TRUNCATE` is the sanctioned form.
fn check_delete_full_table(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    for caps in patterns.delete_from.captures_iter(masked) {
        let whole = caps.get(0).expect("match");
        let tail = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if patterns.where_kw.find(tail).is_none() {
            let table = last_identifier(caps.get(1).expect("table group").as_str());
            push_issue(
                issues,
                sql,
                "R4_DELETE_NO_WHERE",
                format!(
                    "檢測到對表 {} 的全表刪除（DELETE 無 WHERE）。請使用 TRUNCATE。",
                    table
                ),
                whole.start(),
                Some(sql[whole.range()].to_string()),
                "ERROR",
                Some(table),
            );
        }
    }
}

/// R5: comma joins inside a `FROM` clause and `JOIN` segments lacking a
/// condition keyword. The regex crate has no lookahead, so clause ends are
/// resolved by scanning for the next boundary match.
fn check_cartesian(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    for m in patterns.from_kw.find_iter(masked) {
        let start = m.end();
        let end = patterns
            .from_boundary
            .find_at(masked, start)
            .map(|b| b.start())
            .unwrap_or(masked.len());
        let fragment = &masked[start..end];
        if fragment.contains(',') && patterns.join_kw.find(fragment).is_none() {
            push_issue(
                issues,
                sql,
                "R5_FROM_COMMA",
                "FROM 子句使用逗號進行隱式連接，容易產生笛卡兒積。請使用顯式 JOIN ... ON。"
                    .to_string(),
                start,
                Some(sql[start..end].trim().to_string()),
                "ERROR",
                None,
            );
        }
    }

    for m in patterns.join_kw.find_iter(masked) {
        let seg_start = m.end();
        let seg_end = patterns
            .join_boundary
            .find_at(masked, seg_start)
            .map(|b| b.start())
            .unwrap_or(masked.len());
        let segment = &masked[seg_start..seg_end];
        if patterns.join_condition.find(segment).is_none() {
            push_issue(
                issues,
                sql,
                "R5_JOIN_NO_ON",
                "出現 JOIN 但未檢測到 ON/USING/NATURAL（可能導致笛卡兒積或語義不清）。"
                    .to_string(),
                m.start(),
                Some(format!("JOIN{}", &sql[seg_start..seg_end]).trim().to_string()),
                "ERROR",
                None,
            );
        }
    }
}

/// R6: scripts are required to be uppercase; the first lowercase letter is
/// reported once, as a warning.
fn check_lowercase(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    if let Some(m) = patterns.lowercase.find(masked) {
        push_issue(
            issues,
            sql,
            "R6_LOWERCASE",
            "腳本需使用大寫字母，檢測到小寫字元。".to_string(),
            m.start(),
            Some(line_snippet(sql, m.start(), SNIPPET_MAX_LEN)),
            "WARNING",
            None,
        );
    }
}

/// R7: trigger creation is forbidden.
fn check_no_trigger(sql: &str, masked: &str, patterns: &RulePatterns, issues: &mut Vec<Issue>) {
    for m in patterns.create_trigger.find_iter(masked) {
        push_issue(
            issues,
            sql,
            "R7_NO_TRIGGER",
            "不允許建立觸發器。".to_string(),
            m.start(),
            Some(line_snippet(sql, m.start(), SNIPPET_MAX_LEN)),
            "ERROR",
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_count(report: &AnalysisReport, rule: &str) -> usize {
        report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some(rule))
            .count()
    }

    #[test]
    fn test_delete_without_where_fires_once_at_line_one() {
        let report = analyse("DELETE FROM T_ORDERS;");
        assert_eq!(rule_count(&report, "R4_DELETE_NO_WHERE"), 1);
        let issue = report
            .issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some("R4_DELETE_NO_WHERE"))
            .unwrap();
        assert_eq!(issue.line, Some(1));
        assert_eq!(issue.object.as_deref(), Some("T_ORDERS"));
    }

    #[test]
    fn test_delete_with_where_is_clean() {
        let report = analyse("DELETE FROM T_ORDERS WHERE ID = 1;");
        assert_eq!(rule_count(&report, "R4_DELETE_NO_WHERE"), 0);
    }

    #[test]
    fn test_table_prefix_enforced() {
        let report = analyse("CREATE TABLE Orders (ID INT);");
        assert_eq!(rule_count(&report, "R2_PREFIX_TABLE"), 1);
        let issue = report
            .issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some("R2_PREFIX_TABLE"))
            .unwrap();
        assert!(issue.message.contains("Orders"));
        assert_eq!(issue.object.as_deref(), Some("Orders"));

        let clean = analyse("CREATE TABLE T_ORDERS (ID INT);");
        assert_eq!(rule_count(&clean, "R2_PREFIX_TABLE"), 0);
    }

    #[test]
    fn test_prefix_strips_schema_and_delimiters() {
        let report = analyse("CREATE TABLE APP.`T_USERS` (ID INT);");
        assert_eq!(rule_count(&report, "R2_PREFIX_TABLE"), 0);
        let report = analyse("CREATE VIEW DW.[ORDERS_VIEW] AS SELECT 1;");
        let issue = report
            .issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some("R2_PREFIX_VIEW"))
            .unwrap();
        assert_eq!(issue.object.as_deref(), Some("ORDERS_VIEW"));
    }

    #[test]
    fn test_tmp_triple_table_flagged() {
        let report = analyse("CREATE TABLE TMP_TMP_TMP_LOAD (ID INT);");
        assert_eq!(rule_count(&report, "R3_TMP_TRIPLE"), 1);
        // it also fails the T_ prefix rule
        assert_eq!(rule_count(&report, "R2_PREFIX_TABLE"), 1);
    }

    #[test]
    fn test_from_comma_detected() {
        let report = analyse("SELECT * FROM A, B WHERE A.ID = B.ID;");
        assert_eq!(rule_count(&report, "R5_FROM_COMMA"), 1);
        let clean = analyse("SELECT * FROM A JOIN B ON A.ID = B.ID;");
        assert_eq!(rule_count(&clean, "R5_FROM_COMMA"), 0);
        assert_eq!(rule_count(&clean, "R5_JOIN_NO_ON"), 0);
    }

    #[test]
    fn test_join_without_condition_detected() {
        let report = analyse("SELECT * FROM A JOIN B WHERE A.ID = 1;");
        assert_eq!(rule_count(&report, "R5_JOIN_NO_ON"), 1);
        let issue = report
            .issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some("R5_JOIN_NO_ON"))
            .unwrap();
        assert!(issue.evidence.as_deref().unwrap().starts_with("JOIN"));
    }

    #[test]
    fn test_cjk_reported_once() {
        let report = analyse("CREATE TABLE 訂單 (編號 INT);");
        assert_eq!(rule_count(&report, "R1_CJK_NAME"), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.rule_id.as_deref(), Some("R1_CJK_NAME"));
        assert_eq!(issue.evidence.as_deref(), Some("...訂..."));
    }

    #[test]
    fn test_rules_ignore_comments_and_strings() {
        let sql = "SELECT 'DELETE FROM T_A' FROM T_B WHERE ID = 1; -- CREATE TABLE bad\n/* FROM A, B */";
        let report = analyse(sql);
        assert_eq!(rule_count(&report, "R4_DELETE_NO_WHERE"), 0);
        assert_eq!(rule_count(&report, "R2_PREFIX_TABLE"), 0);
        assert_eq!(rule_count(&report, "R5_FROM_COMMA"), 0);
    }

    #[test]
    fn test_lowercase_warning_single() {
        let report = analyse("select 1 from T_A;");
        assert_eq!(rule_count(&report, "R6_LOWERCASE"), 1);
        let issue = report
            .issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some("R6_LOWERCASE"))
            .unwrap();
        assert_eq!(issue.severity, "WARNING");
    }

    #[test]
    fn test_trigger_forbidden() {
        let report = analyse("CREATE OR REPLACE TRIGGER TRG_X BEFORE INSERT ON T_A BEGIN NULL; END;");
        assert_eq!(rule_count(&report, "R7_NO_TRIGGER"), 1);
    }

    #[test]
    fn test_clean_script_reports_ok_text() {
        let report = analyse("SELECT * FROM T_A WHERE ID = 1;");
        assert!(report.issues.is_empty());
        match report.summary {
            AnalysisSummary::Text(ref t) => assert_eq!(t, "代碼正常"),
            _ => panic!("expected text summary"),
        }
    }

    #[test]
    fn test_summary_counts_by_rule() {
        let report = analyse("DELETE FROM T_A; DELETE FROM T_B; CREATE TABLE X (A INT);");
        match report.summary {
            AnalysisSummary::Stats {
                total_issues,
                ref by_rule,
            } => {
                assert_eq!(total_issues, report.issues.len());
                assert_eq!(by_rule.get("R4_DELETE_NO_WHERE"), Some(&Json::from(2u64)));
                assert_eq!(by_rule.get("R2_PREFIX_TABLE"), Some(&Json::from(1u64)));
            }
            _ => panic!("expected stats summary"),
        }
    }

    #[test]
    fn test_non_string_value_degrades() {
        let report = analyse_value(&Json::from(42));
        assert!(report.issues.is_empty());
        match report.summary {
            AnalysisSummary::Text(ref t) => assert_eq!(t, "輸入不是字符串。"),
            _ => panic!("expected text summary"),
        }
    }
}
