pub mod openrouter;
pub mod parse;
pub mod prompt_builder;
mod prompts;
pub mod retry;

pub use parse::{CommitSuggestion, ScoreResult};
pub use prompt_builder::PromptPair;

use crate::error::{LlmError, LlmFailure};
use crate::git::CommitRecord;

/// Trait for talking to an LLM (real backend or a test double).
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the raw completion text.
    fn complete(&self, prompt: &PromptPair) -> Result<String, LlmError>;
}

/// Analyze mode: one request, one score.
pub fn score_commit(llm: &dyn LlmClient, commit: &CommitRecord) -> Result<ScoreResult, LlmFailure> {
    let prompt = prompt_builder::build_analysis_prompt(commit);
    let raw = llm.complete(&prompt)?;
    let result = parse::parse_score(&raw, &commit.hash)?;
    log::debug!("{} scored {}/10", commit.short_hash(), result.score);
    Ok(result)
}

/// Write mode: one request, one suggestion.
pub fn suggest_commit(llm: &dyn LlmClient, diff: &str) -> Result<CommitSuggestion, LlmFailure> {
    let prompt = prompt_builder::build_write_prompt(diff);
    let raw = llm.complete(&prompt)?;
    Ok(parse::parse_suggestion(&raw)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays canned replies in order and counts calls.
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            ScriptedClient {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmClient for ScriptedClient {
        fn complete(&self, _prompt: &PromptPair) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".into())))
        }
    }

    /// Answers each analysis prompt from the hash it contains.
    pub struct ByHashClient<F: Fn(&str) -> Result<String, LlmError> + Send + Sync> {
        pub reply: F,
        pub calls: AtomicUsize,
    }

    impl<F: Fn(&str) -> Result<String, LlmError> + Send + Sync> ByHashClient<F> {
        pub fn new(reply: F) -> Self {
            ByHashClient { reply, calls: AtomicUsize::new(0) }
        }
    }

    impl<F: Fn(&str) -> Result<String, LlmError> + Send + Sync> LlmClient for ByHashClient<F> {
        fn complete(&self, prompt: &PromptPair) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hash = prompt
                .user
                .lines()
                .find_map(|l| l.strip_prefix("Hash: "))
                .unwrap_or_default();
            (self.reply)(hash)
        }
    }
}
