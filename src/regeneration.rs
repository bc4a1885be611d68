//! Regeneration controller: generate -> verify -> accept, or retry up to a bound.
//!
//! States: Generating -> Verifying -> Accepted | Retrying -> Generating | Exhausted.
//! A generation that yields nothing ends the run as `NoQuestionAvailable`
//! without counting as a mismatch. Worst case external calls per run:
//! `max_retries * (1 + num_inferences)`.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::consistency::SelfConsistencyChecker;
use crate::domain::{GeneratedQuestion, QuestionContext, VerificationResult};
use crate::generator::SimilarQuestionGenerator;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_NUM_INFERENCES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationStatus {
  /// Verifier majority agreed with the stated answer.
  Accepted,
  /// Mismatch bound reached; the last question is returned unconfirmed.
  Exhausted,
  /// Generation produced nothing (no misconception, bad input, service down).
  NoQuestionAvailable,
  /// Served without the self-consistency loop.
  Unverified,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegenerationOutcome {
  pub status: RegenerationStatus,
  pub question: Option<GeneratedQuestion>,
  pub verification: Option<VerificationResult>,
  pub mismatch_count: u32,
  pub attempts: u32,
}

impl RegenerationOutcome {
  pub fn trace(&self) -> String {
    self.verification.as_ref().map(VerificationResult::trace).unwrap_or_default()
  }
}

#[derive(Clone)]
pub struct RegenerationController {
  generator: SimilarQuestionGenerator,
  checker: SelfConsistencyChecker,
  max_retries: u32,
  num_inferences: usize,
}

impl RegenerationController {
  pub fn new(generator: SimilarQuestionGenerator, checker: SelfConsistencyChecker) -> Self {
    Self {
      generator,
      checker,
      max_retries: DEFAULT_MAX_RETRIES,
      num_inferences: DEFAULT_NUM_INFERENCES,
    }
  }

  pub fn with_limits(mut self, max_retries: u32, num_inferences: usize) -> Self {
    self.max_retries = max_retries.max(1);
    self.num_inferences = num_inferences.max(1);
    self
  }

  /// One-shot generation with no verification.
  pub async fn generate_unverified(&self, ctx: &QuestionContext) -> RegenerationOutcome {
    let question = self.generator.generate(ctx).await;
    RegenerationOutcome {
      status: if question.is_some() { RegenerationStatus::Unverified } else { RegenerationStatus::NoQuestionAvailable },
      question,
      verification: None,
      mismatch_count: 0,
      attempts: 1,
    }
  }

  #[instrument(
    level = "info",
    skip(self, ctx),
    fields(misconception_id = ?ctx.misconception_id, max_retries = self.max_retries, num_inferences = self.num_inferences)
  )]
  pub async fn run(&self, ctx: &QuestionContext) -> RegenerationOutcome {
    let mut mismatch_count = 0u32;
    let mut attempts = 0u32;

    loop {
      // Generating
      attempts += 1;
      debug!(target: "regen", attempts, mismatch_count, "Generating");
      let Some(question) = self.generator.generate(ctx).await else {
        info!(target: "regen", attempts, mismatch_count, "No question available; stopping");
        return RegenerationOutcome {
          status: RegenerationStatus::NoQuestionAvailable,
          question: None,
          verification: None,
          mismatch_count,
          attempts,
        };
      };

      // Verifying
      debug!(target: "regen", attempts, "Verifying");
      let verification = self.checker.check(&question, self.num_inferences).await;
      let stated = question.stated_letter();
      let agreed = matches!((verification.answer, stated), (Some(v), Some(s)) if v == s);

      if agreed {
        info!(target: "regen", attempts, mismatch_count, answer = %verification.answer_letter(), "Accepted generated question");
        return RegenerationOutcome {
          status: RegenerationStatus::Accepted,
          question: Some(question),
          verification: Some(verification),
          mismatch_count,
          attempts,
        };
      }

      mismatch_count += 1;
      warn!(
        target: "regen",
        attempts,
        mismatch_count,
        stated = %question.correct_answer,
        verified = %verification.answer_letter(),
        "Verifier disagrees with stated answer"
      );

      if mismatch_count >= self.max_retries {
        warn!(target: "regen", attempts, mismatch_count, "Retry bound reached; returning unconfirmed question");
        return RegenerationOutcome {
          status: RegenerationStatus::Exhausted,
          question: Some(question),
          verification: Some(verification),
          mismatch_count,
          attempts,
        };
      }
      // Retrying -> Generating
    }
  }
}
