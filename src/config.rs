//! Configuration discovery and effective settings resolution.
//!
//! Sqlrev reads `sqlrev.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `output`: `human`
//! - `project`: the repository root directory name
//! - `remote.user`: `sqlrev-cli`
//! - `remote.response_mode`: `blocking`
//! - `remote.timeout_secs`: 120
//! - `segmenter`: token_limit 3000, chars_per_token 3.5, safety_margin 0.9
//!
//! Overrides precedence: CLI > config file > environment (`SQLREV_API_KEY`,
//! API key only) > defaults. The resolved remote and segmenter settings are
//! immutable values handed to the client and the segmenter.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ReviewError;
use crate::remote::RemoteSettings;
use crate::segmenter::SegmenterConfig;

#[derive(Debug, Default, Deserialize, Clone)]
/// Remote workflow section under `[remote]`.
pub struct RemoteCfg {
    pub endpoint: Option<String>,
    #[serde(rename = "apiKey", alias = "api_key")]
    pub api_key: Option<String>,
    pub user: Option<String>,
    #[serde(rename = "responseMode", alias = "response_mode")]
    pub response_mode: Option<String>,
    #[serde(rename = "timeoutSecs", alias = "timeout_secs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Segment sizing section under `[segmenter]`.
pub struct SegmenterCfg {
    pub token_limit: Option<usize>,
    pub chars_per_token: Option<f64>,
    pub safety_margin: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `sqlrev.toml|yaml`.
pub struct SqlrevConfig {
    pub output: Option<String>,
    pub project: Option<String>,
    #[serde(default)]
    pub remote: Option<RemoteCfg>,
    #[serde(default)]
    pub segmenter: Option<SegmenterCfg>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub output: String,
    pub project: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub user: String,
    pub response_mode: String,
    pub timeout_secs: u64,
    pub segmenter: SegmenterConfig,
}

impl Effective {
    /// Materialize the remote settings, failing when the endpoint or key is
    /// missing.
    pub fn remote_settings(&self) -> Result<RemoteSettings, ReviewError> {
        let settings = RemoteSettings {
            endpoint: self.endpoint.clone().unwrap_or_default(),
            api_key: self.api_key.clone().unwrap_or_default(),
            user: self.user.clone(),
            response_mode: self.response_mode.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `sqlrev.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if cur.join("sqlrev.toml").exists()
            || cur.join("sqlrev.yaml").exists()
            || cur.join("sqlrev.yml").exists()
        {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `SqlrevConfig` from `sqlrev.toml` or `sqlrev.yaml|yml` if present.
pub fn load_config(root: &Path) -> Option<SqlrevConfig> {
    let toml_path = root.join("sqlrev.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path).ok()?;
        let cfg: SqlrevConfig = toml::from_str(&s).ok()?;
        return Some(cfg);
    }
    for yml in ["sqlrev.yaml", "sqlrev.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p).ok()?;
            let cfg: SqlrevConfig = serde_yaml::from_str(&s).ok()?;
            return Some(cfg);
        }
    }
    None
}

/// Resolve `Effective` by merging CLI flags, discovered config, the
/// environment, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli_output: Option<&str>,
    cli_project: Option<&str>,
    cli_endpoint: Option<&str>,
    cli_api_key: Option<&str>,
    cli_user: Option<&str>,
) -> Effective {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let cfg = load_config(&repo_root).unwrap_or_default();
    let remote = cfg.remote.unwrap_or_default();
    let seg = cfg.segmenter.unwrap_or_default();

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let project = cli_project
        .map(|s| s.to_string())
        .or(cfg.project)
        .or_else(|| {
            repo_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "default".to_string());

    let endpoint = cli_endpoint.map(|s| s.to_string()).or(remote.endpoint);
    let api_key = cli_api_key
        .map(|s| s.to_string())
        .or(remote.api_key)
        .or_else(|| std::env::var("SQLREV_API_KEY").ok())
        .filter(|s| !s.trim().is_empty());

    let user = cli_user
        .map(|s| s.to_string())
        .or(remote.user)
        .unwrap_or_else(|| "sqlrev-cli".to_string());

    let defaults = SegmenterConfig::default();
    let segmenter = SegmenterConfig {
        token_limit: seg.token_limit.unwrap_or(defaults.token_limit),
        chars_per_token: seg.chars_per_token.unwrap_or(defaults.chars_per_token),
        safety_margin: seg.safety_margin.unwrap_or(defaults.safety_margin),
    };

    Effective {
        repo_root,
        output,
        project,
        endpoint,
        api_key,
        user,
        response_mode: remote
            .response_mode
            .unwrap_or_else(|| "blocking".to_string()),
        timeout_secs: remote.timeout_secs.unwrap_or(120),
        segmenter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("sqlrev.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output = "json"
project = "billing"
[remote]
endpoint = "https://dify.local/v1/chat-messages"
api_key = "sk-test"
[segmenter]
token_limit = 1200
    "#
        )
        .unwrap();

        // Resolve using explicit repo_root to avoid global CWD races
        let eff = resolve_effective(root.to_str(), None, None, None, None, None);
        assert_eq!(eff.output, "json");
        assert_eq!(eff.project, "billing");
        assert_eq!(
            eff.endpoint.as_deref(),
            Some("https://dify.local/v1/chat-messages")
        );
        assert_eq!(eff.api_key.as_deref(), Some("sk-test"));
        assert_eq!(eff.segmenter.token_limit, 1200);
        // unspecified segmenter fields keep their defaults
        assert_eq!(eff.segmenter.chars_per_token, 3.5);
    }

    #[test]
    fn test_load_yaml_and_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("sqlrev.yaml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output: human
remote:
  endpoint: https://dify.local/v1/chat-messages
            "#
        )
        .unwrap();

        let eff = resolve_effective(root.to_str(), None, None, None, None, None);
        assert_eq!(eff.output, "human");
        assert_eq!(eff.user, "sqlrev-cli");
        assert_eq!(eff.response_mode, "blocking");
        assert_eq!(eff.timeout_secs, 120);
    }

    #[test]
    fn test_cli_precedence_over_config() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("sqlrev.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output = "json"
[remote]
endpoint = "https://cfg.local"
user = "cfg-user"
            "#
        )
        .unwrap();

        let eff = resolve_effective(
            root.to_str(),
            Some("human"),
            None,
            Some("https://cli.local"),
            None,
            Some("cli-user"),
        );
        assert_eq!(eff.output, "human");
        assert_eq!(eff.endpoint.as_deref(), Some("https://cli.local"));
        assert_eq!(eff.user, "cli-user");
    }

    #[test]
    fn test_remote_settings_require_endpoint_and_key() {
        let dir = tempdir().unwrap();
        let eff = resolve_effective(dir.path().to_str(), None, None, None, None, None);
        assert!(eff.remote_settings().is_err());

        let eff = resolve_effective(
            dir.path().to_str(),
            None,
            None,
            Some("https://dify.local"),
            Some("sk-x"),
            None,
        );
        assert!(eff.remote_settings().is_ok());
    }
}
