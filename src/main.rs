//! Sqlrev CLI binary entry point.
//! Delegates to the library for analysis/review and prints results.

use clap::Parser;
use owo_colors::OwoColorize;
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};

use sqlrev::cli::{Cli, Commands};
use sqlrev::config;
use sqlrev::error::ReviewError;
use sqlrev::models::{AnalysisReport, AnalysisSummary, Issue};
use sqlrev::output;
use sqlrev::remote::WorkflowClient;
use sqlrev::review::{classify_path, run_review, Analyzer, ReviewRequest};
use sqlrev::rules::analyse;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Analyze {
            patterns,
            repo_root,
            stdin,
            output,
        } => {
            let eff = config::resolve_effective(
                repo_root.as_deref(),
                output.as_deref(),
                None,
                None,
                None,
                None,
            );
            let results = if stdin || patterns.is_empty() {
                let mut content = String::new();
                if let Err(e) = std::io::stdin().read_to_string(&mut content) {
                    eprintln!("{} failed to read stdin: {}", error_prefix(), e);
                    std::process::exit(2);
                }
                vec![("<stdin>".to_string(), analyse(&content))]
            } else {
                let targets = collect_targets(&eff.repo_root, &patterns);
                if targets.is_empty() {
                    eprintln!(
                        "{} no files matched the given patterns: {}",
                        error_prefix(),
                        patterns.join(", ")
                    );
                    std::process::exit(2);
                }
                analyze_files(&eff.repo_root, &targets)
            };
            output::print_analyses(&results, &eff.output);
            let errors: usize = results.iter().map(|(_, r)| r.error_count()).sum();
            if errors > 0 {
                std::process::exit(1);
            }
        }
        Commands::Review {
            file,
            repo_root,
            project,
            user,
            endpoint,
            api_key,
            output,
        } => {
            let eff = config::resolve_effective(
                repo_root.as_deref(),
                output.as_deref(),
                project.as_deref(),
                endpoint.as_deref(),
                api_key.as_deref(),
                user.as_deref(),
            );
            let path = eff.repo_root.join(&file);
            let content = match std::fs::read_to_string(&path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!(
                        "{} failed to read {}: {}",
                        error_prefix(),
                        path.to_string_lossy(),
                        e
                    );
                    std::process::exit(2);
                }
            };
            // only the remote route needs a configured client
            let client = match classify_path(&file) {
                Analyzer::RuleEngine => None,
                Analyzer::RemoteWorkflow => match eff
                    .remote_settings()
                    .and_then(WorkflowClient::new)
                {
                    Ok(client) => Some(client),
                    Err(e) => {
                        eprintln!("{} {}", error_prefix(), e);
                        std::process::exit(2);
                    }
                },
            };
            let request = ReviewRequest {
                project_id: eff.project.clone(),
                path: file,
                content,
                selection: None,
                user_id: eff.user.clone(),
            };
            match run_review(&request, &eff.segmenter, client.as_ref()) {
                Ok(report) => {
                    output::print_report(&report, &eff.output);
                    let errors = report
                        .issues
                        .iter()
                        .filter(|i| i.severity.eq_ignore_ascii_case("error"))
                        .count();
                    if errors > 0 {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("{} {}", error_prefix(), e);
                    let code = match e {
                        ReviewError::Configuration(_) | ReviewError::Input(_) => 2,
                        _ => 1,
                    };
                    std::process::exit(code);
                }
            }
        }
    }
}

/// Expand glob patterns (or plain paths) relative to the repository root.
fn collect_targets(root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut targets: Vec<PathBuf> = Vec::new();
    for pat in patterns {
        let abs_glob = root.join(pat);
        let pattern = abs_glob.to_string_lossy().to_string();
        for entry in glob::glob(&pattern).expect("bad glob pattern").flatten() {
            if entry.is_file() {
                targets.push(entry);
            }
        }
    }
    targets.sort();
    targets.dedup();
    targets
}

/// Analyze files in parallel; per-file analysis itself stays single-threaded.
fn analyze_files(root: &Path, targets: &[PathBuf]) -> Vec<(String, AnalysisReport)> {
    targets
        .par_iter()
        .map(|path| {
            let display = pathdiff::diff_paths(path, root)
                .unwrap_or_else(|| path.clone())
                .to_string_lossy()
                .to_string();
            let report = match std::fs::read_to_string(path) {
                Ok(content) => analyse(&content),
                Err(e) => AnalysisReport {
                    summary: AnalysisSummary::Text(format!("failed to read file: {}", e)),
                    issues: vec![Issue {
                        severity: "ERROR".to_string(),
                        message: format!("failed to read file: {}", e),
                        ..Issue::default()
                    }],
                },
            };
            (display, report)
        })
        .collect()
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // log level via RUST_LOG, e.g. RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn error_prefix() -> String {
    if std::env::var_os("NO_COLOR").is_none() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}
