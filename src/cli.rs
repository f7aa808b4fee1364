//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sqlrev",
    version,
    about = "SQL review pipeline (static rules + remote workflow)",
    long_about = "Sqlrev — analyze SQL scripts with a deterministic rule engine and merge remote\nworkflow reviews into one combined report.\n\nConfiguration precedence: CLI > sqlrev.toml > defaults.",
    after_help = "Examples:\n  sqlrev analyze etl/load.sql\n  sqlrev analyze 'sql/**/*.sql' --output json\n  cat load.sql | sqlrev analyze --stdin\n  sqlrev review etl/load.sql --project billing --output json",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands for analyzing and reviewing SQL content.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current sqlrev version.")]
    Version,
    /// Run the local rule engine
    #[command(
        about = "Run static analysis",
        long_about = "Apply the SQL rule engine to files, glob patterns, or stdin. Error-severity findings affect the exit code.",
        after_help = "Examples:\n  sqlrev analyze etl/load.sql\n  sqlrev analyze 'sql/**/*.sql' --output json\n  cat load.sql | sqlrev analyze --stdin"
    )]
    Analyze {
        /// Files or glob patterns, relative to the repository root
        patterns: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Read SQL from stdin instead of files")]
        stdin: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Generate a combined review report
    #[command(
        about = "Generate a combined report",
        long_about = "Route a file through the path classifier: .sql runs the local rule engine, anything else is segmented and sent to the remote workflow. Prints the combined {summary, issues} report.",
        after_help = "Examples:\n  sqlrev review etl/load.sql --project billing\n  sqlrev review notes/job.py --endpoint https://dify.local/v1/chat-messages --api-key sk-..."
    )]
    Review {
        /// File to review, relative to the repository root
        file: String,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Project name recorded in the report")]
        project: Option<String>,
        #[arg(long, help = "User identifier forwarded to the remote workflow")]
        user: Option<String>,
        #[arg(long, help = "Remote workflow endpoint URL")]
        endpoint: Option<String>,
        #[arg(long, help = "Remote workflow API key (or SQLREV_API_KEY)")]
        api_key: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}
