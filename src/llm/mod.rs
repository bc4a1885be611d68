//! Text-completion providers behind one `complete(prompt) -> text` capability.
//!
//! Providers make exactly one request per call. Retrying is the regeneration
//! controller's business, not theirs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ProviderCfg, ProviderKind};
use crate::error::TutorError;

pub mod huggingface;
pub mod openai;

pub use huggingface::HuggingFaceProvider;
pub use openai::OpenAiCompatibleProvider;

const USER_AGENT_VALUE: &str = "misconcept-tutor/0.1";

#[async_trait]
pub trait CompletionProvider: Send + Sync {
  fn name(&self) -> &str;

  /// Stateless prompt-in/text-out call. Sampling may differ between calls.
  async fn complete(&self, prompt: &str) -> Result<String, TutorError>;
}

/// Build the configured provider. Returns None when its credential is missing.
pub fn provider_from_config(cfg: &ProviderCfg) -> Option<Arc<dyn CompletionProvider>> {
  let client = match http_client(cfg.timeout_secs) {
    Ok(c) => c,
    Err(e) => {
      warn!(target: "llm", error = %e, "Failed to build HTTP client; completion disabled");
      return None;
    }
  };

  match cfg.kind {
    ProviderKind::Huggingface => {
      let Ok(api_key) = std::env::var("HUGGINGFACE_API_KEY") else {
        info!(target: "llm", "HUGGINGFACE_API_KEY not set; completion disabled");
        return None;
      };
      let url = cfg.base_url.clone().unwrap_or_else(|| huggingface::model_url(&cfg.model));
      let p = HuggingFaceProvider::new(client, url, api_key, cfg.max_new_tokens, cfg.temperature);
      info!(target: "llm", url = %p.url, timeout_secs = cfg.timeout_secs, "Hugging Face inference enabled");
      Some(Arc::new(p))
    }
    ProviderKind::OpenaiCompatible => {
      let base_url = cfg.base_url.clone().unwrap_or_else(|| "http://localhost:8000/v1".into());
      let api_key = std::env::var("OPENAI_API_KEY").ok();
      let p = OpenAiCompatibleProvider::new(
        client,
        base_url,
        api_key,
        cfg.model.clone(),
        cfg.max_new_tokens,
        cfg.temperature,
      );
      info!(target: "llm", base_url = %p.base_url, model = %p.model, timeout_secs = cfg.timeout_secs, "OpenAI-compatible completion enabled");
      Some(Arc::new(p))
    }
  }
}

/// Every provider shares one timeout-bounded client; a stalled service turns into
/// `ServiceUnavailable` instead of hanging the regeneration loop.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, TutorError> {
  if timeout_secs == 0 {
    return Err(TutorError::InvalidInput("provider.timeout_secs must be > 0".into()));
  }
  reqwest::Client::builder()
    .timeout(Duration::from_secs(timeout_secs))
    .build()
    .map_err(|e| TutorError::ServiceUnavailable(e.to_string()))
}

/// Turn a non-success response into `ServiceError` with the cleanest message available.
pub(crate) async fn error_for_status(res: reqwest::Response) -> TutorError {
  let status = res.status();
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body).unwrap_or(body);
  TutorError::ServiceError { status: status.as_u16(), message }
}

/// Accepts `{"error": "..."}` (Hugging Face) and `{"error": {"message": "..."}}` (OpenAI).
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EBody }
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum EBody {
    Text(String),
    Obj { message: String },
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(EWrap { error: EBody::Text(m) }) => Some(m),
    Ok(EWrap { error: EBody::Obj { message } }) => Some(message),
    Err(_) => None,
  }
}
