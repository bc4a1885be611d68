//! Similar-question generation: catalog lookup -> prompt -> completion -> parse.
//!
//! `generate` never returns an error. Every failure (malformed context, no
//! misconception to target, service outage) is logged and folds into `None`.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::catalog::MisconceptionCatalog;
use crate::config::Prompts;
use crate::domain::{GeneratedQuestion, QuestionContext};
use crate::llm::CompletionProvider;
use crate::parser::parse_model_output;
use crate::prompts::build_generation_prompt;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct SimilarQuestionGenerator {
  catalog: Arc<MisconceptionCatalog>,
  provider: Arc<dyn CompletionProvider>,
  prompts: Prompts,
}

impl SimilarQuestionGenerator {
  pub fn new(catalog: Arc<MisconceptionCatalog>, provider: Arc<dyn CompletionProvider>, prompts: Prompts) -> Self {
    Self { catalog, provider, prompts }
  }

  #[instrument(
    level = "info",
    skip(self, ctx),
    fields(misconception_id = ?ctx.misconception_id, provider = self.provider.name())
  )]
  pub async fn generate(&self, ctx: &QuestionContext) -> Option<GeneratedQuestion> {
    if let Err(e) = ctx.validate() {
      error!(target: "regen", error = %e, "Rejected malformed question context");
      return None;
    }

    let Some(id) = ctx.misconception_id else {
      info!(target: "regen", "No misconception id; skipping question generation");
      return None;
    };
    let misconception = self.catalog.lookup(Some(id));
    match misconception {
      Some(text) => debug!(target: "regen", id, misconception = %text, "Misconception resolved"),
      None => warn!(target: "regen", id, "Misconception id not in catalog; generating without target clause"),
    }

    let prompt = build_generation_prompt(&self.prompts, ctx, misconception);
    debug!(target: "regen", prompt = %trunc_for_log(&prompt, 400), "Generation prompt built");

    let start = std::time::Instant::now();
    let raw = match self.provider.complete(&prompt).await {
      Ok(raw) => raw,
      Err(e) => {
        error!(target: "regen", elapsed = ?start.elapsed(), error = %e, "Model call failed during question generation");
        return None;
      }
    };
    debug!(target: "regen", elapsed = ?start.elapsed(), raw = %trunc_for_log(&raw, 400), "Model response received");

    let question = parse_model_output(&raw);
    info!(
      target: "regen",
      complete = question.is_complete(),
      choices = question.choices.len(),
      "Similar question generated"
    );
    debug!(
      target: "regen",
      stated = %question.correct_answer,
      question_preview = %trunc_for_log(&question.question, 40),
      "Generated question contents"
    );
    Some(question)
  }
}
