//! Loading service configuration (data paths, provider, regeneration policy, prompts) from TOML.
//!
//! Every section is optional; see `TutorConfig` for the schema and defaults.
//! Credentials never live in the file, they come from the environment.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct TutorConfig {
  pub data: DataCfg,
  pub quiz: QuizCfg,
  pub provider: ProviderCfg,
  pub regeneration: RegenerationCfg,
  pub prompts: Prompts,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DataCfg {
  pub misconception_csv: String,
  pub questions_csv: String,
}

impl Default for DataCfg {
  fn default() -> Self {
    Self {
      misconception_csv: "data/misconception_mapping.csv".into(),
      questions_csv: "data/train.csv".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizCfg {
  pub length: usize,
  /// Fixed seed makes question sampling reproducible.
  pub seed: Option<u64>,
  /// Finished sessions are dropped this long after entering review.
  pub session_ttl_secs: u64,
  /// Upper bound on live sessions; the oldest are dropped first.
  pub max_sessions: usize,
}

impl Default for QuizCfg {
  fn default() -> Self {
    Self { length: 10, seed: None, session_ttl_secs: 3600, max_sessions: 10_000 }
  }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
  /// Hosted inference API taking `{"inputs": prompt}`.
  Huggingface,
  /// Any server exposing `/completions` (vLLM, llama.cpp, Ollama, ...).
  OpenaiCompatible,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProviderCfg {
  pub kind: ProviderKind,
  /// Full model URL for `huggingface`, API root (".../v1") for `openai_compatible`.
  pub base_url: Option<String>,
  pub model: String,
  pub timeout_secs: u64,
  pub max_new_tokens: u32,
  pub temperature: f32,
}

impl Default for ProviderCfg {
  fn default() -> Self {
    Self {
      kind: ProviderKind::Huggingface,
      base_url: None,
      model: "meta-llama/Meta-Llama-3-8B-Instruct".into(),
      timeout_secs: 30,
      max_new_tokens: 512,
      temperature: 0.7,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegenerationCfg {
  /// When false, similar questions are served without the self-consistency loop.
  pub verify: bool,
  pub max_retries: u32,
  pub num_inferences: usize,
  /// Verification calls in flight at once.
  pub concurrency: usize,
}

impl Default for RegenerationCfg {
  fn default() -> Self {
    Self { verify: true, max_retries: 5, num_inferences: 10, concurrency: 4 }
  }
}

/// Texts placed inside the role-delimited prompt frame.
/// Override them in TOML to tune tone; placeholders are listed per field.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// `{misconception_clause}`
  pub generation_system: String,
  /// `{construct_name}`, `{subject_name}`, `{question_text}`, `{correct_answer_text}`, `{wrong_answer_text}`
  pub generation_user_template: String,
  pub verification_system: String,
  /// `{question}`, `{choice_a}` .. `{choice_d}`
  pub verification_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an educational assistant designed to generate multiple-choice questions{misconception_clause}".into(),
      generation_user_template: "You need to create a similar multiple-choice question based on the following details:\n\n\
Construct Name: {construct_name}\n\
Subject Name: {subject_name}\n\
Question Text: {question_text}\n\
Correct Answer: {correct_answer_text}\n\
Wrong Answer: {wrong_answer_text}\n\n\
Please follow this output format:\n\
---\n\
Question: <Your Question Text>\n\
A) <Choice A>\n\
B) <Choice B>\n\
C) <Choice C>\n\
D) <Choice D>\n\
Correct Answer: <Correct Choice (e.g., A)>\n\
Explanation: <Brief explanation for the correct answer>\n\
---\n\
Ensure that the question is conceptually similar but not identical to the original. Ensure clarity and educational value.".into(),
      verification_system: "You are an expert solution checker for multiple-choice questions. \
You will be given a question and four choices (A, B, C, D). \
Your job is to determine the single best answer. \
You must reason step by step internally but DO NOT reveal your reasoning. \
Output ONLY the final answer in the format: 'Answer: X' with no extra text.".into(),
      verification_user_template: "Question: {question}\n\n\
Choices:\n\
A) {choice_a}\n\
B) {choice_b}\n\
C) {choice_c}\n\
D) {choice_d}\n\n\
Select one correct option from A, B, C, or D.".into(),
    }
  }
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TutorConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tutor", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_yields_defaults() {
    let cfg: TutorConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.quiz.length, 10);
    assert_eq!(cfg.quiz.session_ttl_secs, 3600);
    assert_eq!(cfg.quiz.max_sessions, 10_000);
    assert_eq!(cfg.regeneration.max_retries, 5);
    assert_eq!(cfg.regeneration.num_inferences, 10);
    assert!(cfg.regeneration.verify);
    assert_eq!(cfg.provider.kind, ProviderKind::Huggingface);
    assert!(cfg.prompts.generation_system.contains("{misconception_clause}"));
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg: TutorConfig = toml::from_str(
      r#"
      [provider]
      kind = "openai_compatible"
      base_url = "http://localhost:8000/v1"

      [regeneration]
      num_inferences = 3

      [quiz]
      seed = 42
      "#,
    )
    .unwrap();
    assert_eq!(cfg.provider.kind, ProviderKind::OpenaiCompatible);
    assert_eq!(cfg.provider.timeout_secs, 30);
    assert_eq!(cfg.regeneration.num_inferences, 3);
    assert_eq!(cfg.regeneration.max_retries, 5);
    assert_eq!(cfg.quiz.seed, Some(42));
    assert_eq!(cfg.data.questions_csv, "data/train.csv");
  }
}
