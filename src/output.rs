//! Output rendering for analyze and review commands.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-item fields and a top-level summary.

use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

use crate::models::{AnalysisReport, Column, CombinedReport, Issue};

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn severity_tag(severity: &str, color: bool) -> String {
    let (tag, icon) = if severity.eq_ignore_ascii_case("error") {
        ("⟦error⟧", "✖")
    } else if severity.eq_ignore_ascii_case("warning") || severity.eq_ignore_ascii_case("warn") {
        ("⟦warn⟧", "▲")
    } else {
        ("⟦info⟧", "◆")
    };
    if color {
        match icon {
            "✖" => format!("{} {}", icon.red(), tag.red().bold()),
            "▲" => format!("{} {}", icon.yellow(), tag.yellow().bold()),
            _ => format!("{} {}", icon.blue(), tag.blue().bold()),
        }
    } else {
        format!("{} {}", icon, tag)
    }
}

fn location(issue: &Issue) -> String {
    match (issue.line, &issue.column) {
        (Some(line), Some(Column::One(col))) => format!("{}:{}", line, col),
        (Some(line), Some(Column::Many(cols))) if !cols.is_empty() => {
            format!("{}:{}", line, cols[0])
        }
        (Some(line), _) => line.to_string(),
        _ => "-".to_string(),
    }
}

fn print_issue_line(file: &str, issue: &Issue, color: bool) {
    let rule = issue.rule_id.as_deref().unwrap_or("-");
    let file_part = if color {
        format!("{}:{}", file.bold(), location(issue))
    } else {
        format!("{}:{}", file, location(issue))
    };
    println!(
        "{} {} ❲{}❳ — {}",
        severity_tag(&issue.severity, color),
        file_part,
        rule,
        issue.message
    );
}

fn severity_totals(issues: &[Issue]) -> (usize, usize, usize) {
    let mut errs = 0usize;
    let mut warns = 0usize;
    let mut infos = 0usize;
    for issue in issues {
        if issue.severity.eq_ignore_ascii_case("error") {
            errs += 1;
        } else if issue.severity.eq_ignore_ascii_case("warning")
            || issue.severity.eq_ignore_ascii_case("warn")
        {
            warns += 1;
        } else {
            infos += 1;
        }
    }
    (errs, warns, infos)
}

/// Print a batch of per-file analysis reports in the requested format.
pub fn print_analyses(results: &[(String, AnalysisReport)], output: &str) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&compose_analyses_json(results)).unwrap()
        ),
        _ => {
            let color = use_colors(output);
            for (file, report) in results {
                for issue in &report.issues {
                    print_issue_line(file, issue, color);
                }
            }
            let all: Vec<Issue> = results
                .iter()
                .flat_map(|(_, r)| r.issues.iter().cloned())
                .collect();
            let (errs, warns, infos) = severity_totals(&all);
            let summary = format!(
                "— Summary — errors={} warnings={} infos={} files={}",
                errs,
                warns,
                infos,
                results.len()
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print a combined review report in the requested format.
pub fn print_report(report: &CombinedReport, output: &str) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&compose_report_json(report)).unwrap()
        ),
        _ => {
            let color = use_colors(output);
            for record in &report.summary {
                let status = record
                    .status
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string());
                let head = format!(
                    "◦ {} [{}] issues={} status={}",
                    record.label, record.source, record.total_issues, status
                );
                if color {
                    println!("{}", head.bold());
                } else {
                    println!("{}", head);
                }
                if let Some(err) = &record.error_message {
                    println!("  error: {}", err);
                }
                if let Some(msg) = &record.message {
                    println!("  {}", msg);
                }
            }
            for issue in &report.issues {
                let file = issue.source.as_deref().unwrap_or("-");
                print_issue_line(file, issue, color);
            }
        }
    }
}

/// Compose the batch-analysis JSON object (pure) for testing purposes.
pub fn compose_analyses_json(results: &[(String, AnalysisReport)]) -> JsonVal {
    let items: Vec<JsonVal> = results
        .iter()
        .map(|(file, report)| {
            json!({
                "file": file,
                "summary": serde_json::to_value(&report.summary).unwrap_or(JsonVal::Null),
                "issues": serde_json::to_value(&report.issues).unwrap_or(JsonVal::Null),
            })
        })
        .collect();
    let all: Vec<Issue> = results
        .iter()
        .flat_map(|(_, r)| r.issues.iter().cloned())
        .collect();
    let (errs, warns, infos) = severity_totals(&all);
    json!({
        "results": items,
        "summary": {
            "errors": errs,
            "warnings": warns,
            "infos": infos,
            "files": results.len(),
        }
    })
}

/// Compose the combined-report JSON object (pure), keeping a stable shape.
pub fn compose_report_json(report: &CombinedReport) -> JsonVal {
    serde_json::to_value(report).unwrap_or(JsonVal::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisSummary, SummaryRecord};

    fn issue(severity: &str) -> Issue {
        Issue {
            rule_id: Some("R4_DELETE_NO_WHERE".to_string()),
            severity: severity.to_string(),
            message: "m".to_string(),
            line: Some(3),
            column: Some(Column::One(1)),
            ..Issue::default()
        }
    }

    #[test]
    fn test_compose_analyses_json_totals() {
        let results = vec![
            (
                "a.sql".to_string(),
                AnalysisReport {
                    summary: AnalysisSummary::Text("代碼正常".to_string()),
                    issues: vec![],
                },
            ),
            (
                "b.sql".to_string(),
                AnalysisReport {
                    summary: AnalysisSummary::Stats {
                        total_issues: 2,
                        by_rule: serde_json::Map::new(),
                    },
                    issues: vec![issue("ERROR"), issue("WARNING")],
                },
            ),
        ];
        let out = compose_analyses_json(&results);
        assert_eq!(out["summary"]["errors"], 1);
        assert_eq!(out["summary"]["warnings"], 1);
        assert_eq!(out["summary"]["files"], 2);
        assert_eq!(out["results"][0]["summary"], "代碼正常");
        assert_eq!(out["results"][1]["issues"][0]["rule_id"], "R4_DELETE_NO_WHERE");
    }

    #[test]
    fn test_compose_report_json_shape() {
        let report = CombinedReport {
            summary: vec![SummaryRecord {
                source: "static_analyzer".to_string(),
                label: "靜態規則引擎".to_string(),
                total_issues: 1,
                status: Some(crate::models::ReportStatus::Success),
                generated_at: None,
                error_message: None,
                message: None,
                metrics: serde_json::Map::new(),
            }],
            issues: vec![issue("ERROR")],
        };
        let out = compose_report_json(&report);
        assert_eq!(out["summary"][0]["source"], "static_analyzer");
        assert_eq!(out["summary"][0]["status"], "success");
        assert_eq!(out["issues"][0]["line"], 3);
    }
}
