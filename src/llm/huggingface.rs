//! Hugging Face inference API provider.
//!
//! The endpoint answers with either a single object or a list of objects, each
//! optionally carrying `generated_text`. Both shapes are folded into one string
//! through `InferenceResponse::into_text`; anything unrecognised becomes "".

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use async_trait::async_trait;

use super::{error_for_status, CompletionProvider, USER_AGENT_VALUE};
use crate::error::TutorError;
use crate::util::trunc_for_log;

pub fn model_url(model: &str) -> String {
  format!("https://api-inference.huggingface.co/models/{}", model)
}

#[derive(Clone)]
pub struct HuggingFaceProvider {
  pub client: reqwest::Client,
  pub url: String,
  api_key: String,
  pub max_new_tokens: u32,
  pub temperature: f32,
}

impl HuggingFaceProvider {
  pub fn new(client: reqwest::Client, url: String, api_key: String, max_new_tokens: u32, temperature: f32) -> Self {
    Self { client, url, api_key, max_new_tokens, temperature }
  }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
  inputs: &'a str,
  parameters: InferenceParams,
}

#[derive(Serialize)]
struct InferenceParams {
  max_new_tokens: u32,
  temperature: f32,
  do_sample: bool,
  /// Without this the prompt (and its output template) is echoed back.
  return_full_text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InferenceResponse {
  Many(Vec<InferenceItem>),
  One(InferenceItem),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InferenceItem {
  Generated { generated_text: String },
  Text(String),
  Other(serde::de::IgnoredAny),
}

impl InferenceItem {
  fn into_text(self) -> String {
    match self {
      InferenceItem::Generated { generated_text } => generated_text,
      InferenceItem::Text(s) => s,
      InferenceItem::Other(_) => String::new(),
    }
  }
}

impl InferenceResponse {
  pub(crate) fn into_text(self) -> String {
    match self {
      InferenceResponse::Many(items) => items.into_iter().next().map(InferenceItem::into_text).unwrap_or_default(),
      InferenceResponse::One(item) => item.into_text(),
    }
  }
}

/// Normalise a raw response body; non-JSON or unexpected JSON yields "".
pub(crate) fn normalize_body(body: &str) -> String {
  match serde_json::from_str::<InferenceResponse>(body) {
    Ok(r) => r.into_text(),
    Err(e) => {
      warn!(target: "llm", error = %e, body = %trunc_for_log(body, 200), "Unrecognised inference response shape");
      String::new()
    }
  }
}

#[async_trait]
impl CompletionProvider for HuggingFaceProvider {
  fn name(&self) -> &str {
    "huggingface"
  }

  #[instrument(level = "info", skip(self, prompt), fields(url = %self.url, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, TutorError> {
    let req = InferenceRequest {
      inputs: prompt,
      parameters: InferenceParams {
        max_new_tokens: self.max_new_tokens,
        temperature: self.temperature,
        do_sample: true,
        return_full_text: false,
      },
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&self.url)
      .header(USER_AGENT, USER_AGENT_VALUE)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| {
        error!(target: "llm", error = %e, timeout = e.is_timeout(), "Inference request failed");
        TutorError::ServiceUnavailable(e.to_string())
      })?;

    if !res.status().is_success() {
      let err = error_for_status(res).await;
      error!(target: "llm", error = %err, "Inference API returned an error");
      return Err(err);
    }

    let body = res.text().await.map_err(TutorError::from)?;
    let text = normalize_body(&body);
    debug!(target: "llm", elapsed = ?start.elapsed(), text_len = text.len(), "Inference response received");
    Ok(text)
  }
}
