//! Error kinds for commit-critic, using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors resolving the session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "OPENROUTER_API_KEY is not set. Export it, pass --api-key, or add \
         OPENROUTER_API_KEY=sk-or-... to a .env file"
    )]
    MissingApiKey,

    #[error("Failed to read config file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from git repository access.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("git executable not found on PATH: {0}")]
    GitNotFound(#[source] which::Error),

    #[error("{} is not a Git repository: {stderr}", path.display())]
    NotARepository { path: PathBuf, stderr: String },

    #[error(
        "Authentication required for {url}. Private repositories are not supported; \
         clone it yourself and run without --url"
    )]
    CloneAuthRequired { url: String },

    #[error("Repository not found or not accessible: {url}")]
    CloneNotFound { url: String },

    #[error("Cloning {url} timed out after {secs}s")]
    CloneTimedOut { url: String, secs: u64 },

    #[error("git clone of {url} failed: {stderr}")]
    CloneFailed { url: String, stderr: String },

    #[error("Failed to create temporary clone directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Commit failed:\n{stderr}")]
    CommitRejected { stderr: String },
}

/// Errors talking to the completion endpoint.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request to LLM provider failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("LLM provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from LLM provider: {0}")]
    InvalidResponse(String),

    #[error("LLM request abandoned after interrupt")]
    Cancelled,

    #[error("LLM request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Timeouts, connection failures, rate limits and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::InvalidResponse(_)
            | LlmError::Cancelled
            | LlmError::RetriesExhausted { .. } => false,
        }
    }

    /// Auth and validation errors: every further request would fail the same way.
    pub fn is_permanent(&self) -> bool {
        matches!(self, LlmError::Status { status, .. } if (400..500).contains(status) && *status != 429)
    }
}

/// The model answered, but not in a shape we can use.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("no score between 1 and 10 found in response: {excerpt}")]
    MissingScore { excerpt: String },

    #[error("score {0} is outside the 1-10 range")]
    ScoreOutOfRange(i64),

    #[error("response has a score but no rationale")]
    MissingRationale,

    #[error("response scores commit {found}, expected {expected}")]
    HashMismatch { expected: String, found: String },

    #[error("no commit title found in response: {excerpt}")]
    MissingTitle { excerpt: String },

    #[error("suggested title is {len} characters, limit is {max}: {title}")]
    TitleTooLong { len: usize, max: usize, title: String },
}

/// A completion that produced no usable result.
#[derive(Error, Debug)]
pub enum LlmFailure {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
