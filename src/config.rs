use crate::cli_args::Cli;
use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";
pub const DEFAULT_COMMIT_COUNT: u32 = 50;
pub const DEFAULT_JOBS: usize = 4;

/// Final resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub count: u32,
    pub remote_url: Option<String>,
    pub jobs: usize,
}

impl SessionConfig {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--base-url`, `--api-key`)
    ///   2. Env vars `OPENROUTER_MODEL`, `OPENROUTER_BASE_URL`, `OPENROUTER_API_KEY`
    ///   3. TOML `~/.config/commit-critic.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self, ConfigError> {
        let file_cfg = match config_path() {
            Some(path) => load_file_config(&path)?,
            None => FileConfig::default(),
        };
        resolve(cli, file_cfg, |name| env::var(name).ok())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub jobs: Option<usize>,
}

fn resolve<F>(cli: &Cli, file_cfg: FileConfig, env_var: F) -> Result<SessionConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let api_key = non_empty(cli.api_key.clone())
        .or_else(|| non_empty(env_var("OPENROUTER_API_KEY")))
        .or_else(|| non_empty(file_cfg.api_key))
        .ok_or(ConfigError::MissingApiKey)?;

    let base_url = non_empty(cli.base_url.clone())
        .or_else(|| non_empty(env_var("OPENROUTER_BASE_URL")))
        .or_else(|| non_empty(file_cfg.base_url))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let model = non_empty(cli.model.clone())
        .or_else(|| non_empty(env_var("OPENROUTER_MODEL")))
        .or_else(|| non_empty(file_cfg.model))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let jobs = cli
        .jobs
        .map(|j| j as usize)
        .or(file_cfg.jobs)
        .unwrap_or(DEFAULT_JOBS)
        .clamp(1, 8);

    Ok(SessionConfig {
        api_key,
        base_url,
        model,
        count: cli.num.unwrap_or(DEFAULT_COMMIT_COUNT),
        remote_url: cli.url.clone(),
        jobs,
    })
}

/// Return `~/.config/commit-critic.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("commit-critic.toml"))
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let data = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<FileConfig>(&data).map_err(|source| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["commit-critic"];
        argv.extend_from_slice(args);
        let mut cli = Cli::parse_from(argv);
        // clap reads OPENROUTER_API_KEY from the test process; keep tests hermetic.
        if !args.iter().any(|a| a.starts_with("--api-key")) {
            cli.api_key = None;
        }
        cli
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = resolve(&cli(&["--analyze"]), FileConfig::default(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let env = |name: &str| (name == "OPENROUTER_API_KEY").then(|| "  ".to_string());
        let err = resolve(&cli(&["--write"]), FileConfig::default(), env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_apply() {
        let env = |name: &str| (name == "OPENROUTER_API_KEY").then(|| "sk-or-test".to_string());
        let cfg = resolve(&cli(&["--analyze"]), FileConfig::default(), env).unwrap();
        assert_eq!(cfg.api_key, "sk-or-test");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.count, DEFAULT_COMMIT_COUNT);
        assert_eq!(cfg.jobs, DEFAULT_JOBS);
        assert!(cfg.remote_url.is_none());
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file = FileConfig {
            api_key: Some("file-key".into()),
            base_url: Some("https://file.example/v1".into()),
            model: Some("file/model".into()),
            jobs: Some(2),
        };
        let env = |name: &str| match name {
            "OPENROUTER_MODEL" => Some("env/model".to_string()),
            _ => None,
        };
        let cfg = resolve(
            &cli(&["--analyze", "--base-url", "https://cli.example/v1", "-n", "7"]),
            file,
            env,
        )
        .unwrap();
        assert_eq!(cfg.api_key, "file-key");
        assert_eq!(cfg.base_url, "https://cli.example/v1");
        assert_eq!(cfg.model, "env/model");
        assert_eq!(cfg.count, 7);
        assert_eq!(cfg.jobs, 2);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit-critic.toml");
        fs::write(&path, "model = [unterminated").unwrap();
        let err = load_file_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
    }

    #[test]
    fn absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_file_config(&dir.path().join("missing.toml")).unwrap();
        assert!(cfg.model.is_none() && cfg.api_key.is_none());
    }
}
