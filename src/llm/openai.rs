//! OpenAI-compatible `/completions` provider.
//!
//! Meant for self-hosted model servers (vLLM, llama.cpp, Ollama) that accept a
//! raw prompt. The API key is optional since local servers often run without one.
//!
//! NOTE: We never log the API key.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use async_trait::async_trait;

use super::{error_for_status, CompletionProvider, USER_AGENT_VALUE};
use crate::error::TutorError;

#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
  pub client: reqwest::Client,
  pub base_url: String,
  api_key: Option<String>,
  pub model: String,
  pub max_tokens: u32,
  pub temperature: f32,
}

impl OpenAiCompatibleProvider {
  pub fn new(
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
  ) -> Self {
    let base_url = base_url.trim_end_matches('/').to_string();
    Self { client, base_url, api_key, model, max_tokens, temperature }
  }
}

// --- Completion DTOs ---

#[derive(Serialize)]
struct CompletionRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  temperature: f32,
  max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
  #[serde(default)] choices: Vec<CompletionChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct CompletionChoice { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
  fn name(&self) -> &str {
    "openai_compatible"
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, TutorError> {
    let url = format!("{}/completions", self.base_url);
    let req = CompletionRequest {
      model: &self.model,
      prompt,
      temperature: self.temperature,
      max_tokens: self.max_tokens,
    };

    let mut builder = self.client.post(&url)
      .header(USER_AGENT, USER_AGENT_VALUE)
      .header(CONTENT_TYPE, "application/json");
    if let Some(key) = &self.api_key {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
    }

    let start = std::time::Instant::now();
    let res = builder.json(&req).send().await.map_err(|e| {
      error!(target: "llm", error = %e, timeout = e.is_timeout(), "Completion request failed");
      TutorError::ServiceUnavailable(e.to_string())
    })?;

    if !res.status().is_success() {
      let err = error_for_status(res).await;
      error!(target: "llm", error = %err, "Completion API returned an error");
      return Err(err);
    }

    let body: CompletionResponse = res.json().await.map_err(TutorError::from)?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.text)
      .unwrap_or_default();
    debug!(target: "llm", elapsed = ?start.elapsed(), text_len = text.len(), "Completion received");
    Ok(text)
  }
}
