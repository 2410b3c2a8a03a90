//! Chat-completions judge for OpenAI-compatible endpoints.

use super::prompt::{parse_verdict, system_prompt, user_prompt};
use super::{IssueJudge, Judgment};
use crate::domain::{Config, ConfigError};
use crate::retry::{send_with_retry, RemoteError, RetryPolicy};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_TOKENS: u32 = 200;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatJudge {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
    retry: RetryPolicy,
}

impl ChatJudge {
    pub fn new(config: &Config, criteria: &str) -> Result<Self> {
        let api_key = config
            .llm_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential("FORGE_API_KEY"))?;

        let http = Client::builder()
            .user_agent(concat!("issue-hook/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.llm_base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: system_prompt(criteria),
            retry: RetryPolicy::from_config(config),
        })
    }

    fn complete(&self, user: &str) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: &self.system_prompt },
                Message { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let response = send_with_retry(&self.retry, &self.endpoint, || {
            self.http.post(&self.endpoint).bearer_auth(&self.api_key).json(&request).send()
        })?;
        let text = response
            .text()
            .map_err(|source| RemoteError::Transport { url: self.endpoint.clone(), source })?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|source| RemoteError::Decode { url: self.endpoint.clone(), source })?;

        Ok(parsed.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default())
    }
}

impl IssueJudge for ChatJudge {
    fn judge(&self, issue_text: &str) -> Result<Judgment> {
        let answer = self.complete(&user_prompt(issue_text))?;
        let answer = answer.trim();
        if answer.is_empty() {
            anyhow::bail!("Classification service returned an empty answer");
        }
        Ok(Judgment { is_match: parse_verdict(answer), rationale: answer.to_string() })
    }
}
