use super::LlmClient;
use super::prompt_builder::{truncate, PromptPair};
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::error::LlmError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Minimal request/response structs for the OpenAI-compatible Chat Completions API.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenRouter (or any OpenAI-compatible endpoint) implementation of LlmClient.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    api_base_url: String,
    retry: RetryPolicy,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String, api_base_url: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(LlmError::Transport)?;

        Ok(OpenRouterClient {
            client,
            api_key,
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }

    /// One request, no retries.
    fn call_chat(&self, req: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = self.chat_url();

        log::info!("Calling model {:?} at {}", req.model, url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "commit-critic")
            .json(req)
            .send()
            .map_err(LlmError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: provider_message(&text),
            });
        }

        let body = resp.text().map_err(LlmError::Transport)?;
        log::trace!("Raw response: {}", truncate(&body, 4000));

        let content = chat_content(&body)?;
        log::trace!("Completion:\n{}", truncate(&content, 3000));
        Ok(content)
    }
}

impl LlmClient for OpenRouterClient {
    fn complete(&self, prompt: &PromptPair) -> Result<String, LlmError> {
        log::trace!("Prompt:\n{}", truncate(&prompt.user, 3000));

        let req = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        retry_with_backoff(&self.retry, || self.call_chat(&req))
    }
}

/// Pull the assistant text out of a chat-completions response body.
fn chat_content(body: &str) -> Result<String, LlmError> {
    let chat_resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("{e}: {}", truncate(body, 200))))?;

    if let Some(usage) = &chat_resp.usage {
        log::debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
    }

    chat_resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("no content in response choices".into()))
}

/// The provider's own error message when the body carries one.
fn provider_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => truncate(body.trim(), 500),
    }
}
