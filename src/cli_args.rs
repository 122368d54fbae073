use clap::{ArgAction, ArgGroup, Parser};

const AFTER_HELP: &str = "Examples:
  commit-critic --analyze                   Review the last 50 commits of the current repo
  commit-critic --analyze -n 100            Review the last 100 commits
  commit-critic --analyze --url=<repo_url>  Review a remote repository
  commit-critic --write                     Suggest a commit message for staged changes";

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "commit-critic",
    version,
    about = "LLM-assisted Git commit message critic and writer",
    after_help = AFTER_HELP
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["analyze", "write"])
        .required(true)
        .multiple(false)
))]
pub struct Cli {
    /// Score the existing commit history
    #[arg(long)]
    pub analyze: bool,

    /// Suggest a commit message for the staged changes and commit it
    #[arg(long)]
    pub write: bool,

    /// Remote Git repository to analyze instead of the current directory
    #[arg(long, value_name = "REPO_URL", requires = "analyze")]
    pub url: Option<String>,

    /// Number of commits to analyze [default: 50]
    #[arg(
        short = 'n',
        long = "num",
        value_name = "N",
        requires = "analyze",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub num: Option<u32>,

    /// Concurrent scoring requests [default: 4]
    #[arg(
        short = 'j',
        long,
        value_name = "JOBS",
        requires = "analyze",
        value_parser = clap::value_parser!(u32).range(1..=8)
    )]
    pub jobs: Option<u32>,

    /// Model identifier (otherwise OPENROUTER_MODEL or the config file)
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API (otherwise OPENROUTER_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// API key (otherwise uses OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Which flow the invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Analyze,
    Write,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.analyze { Mode::Analyze } else { Mode::Write }
    }
}
