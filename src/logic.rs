//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting quizzes and recording answers
//!   - Building the review summary
//!   - Running similar-question generation for a recorded wrong answer,
//!     with or without the self-consistency loop

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{ChoiceLetter, QuestionContext};
use crate::error::TutorError;
use crate::protocol::{AnswerOut, RegenerationOut, SessionOut};
use crate::quiz::QuizReview;
use crate::regeneration::{RegenerationOutcome, RegenerationStatus};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn start_quiz(state: &AppState) -> Result<SessionOut, TutorError> {
  let session = state.start_session().await?;
  Ok(SessionOut::from(&session))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn session_status(state: &AppState, session_id: Uuid) -> Result<SessionOut, TutorError> {
  let session = state.get_session(session_id).await?;
  Ok(SessionOut::from(&session))
}

#[instrument(level = "info", skip(state), fields(%session_id, %answer))]
pub async fn submit_answer(state: &AppState, session_id: Uuid, answer: &str) -> Result<AnswerOut, TutorError> {
  let letter = ChoiceLetter::parse(answer)?;
  let (feedback, session) = state.answer(session_id, letter).await?;
  info!(target: "tutor", session = %session_id, correct = feedback.correct, "Answer recorded");
  Ok(AnswerOut::new(&feedback, &session))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn review(state: &AppState, session_id: Uuid) -> Result<QuizReview, TutorError> {
  state.review(session_id).await
}

/// Similar question for the `index`-th wrong answer. `verify` requests the
/// self-consistency loop; it is skipped anyway when disabled in config.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn similar_for_wrong_answer(
  state: &AppState,
  session_id: Uuid,
  index: usize,
  verify: bool,
) -> Result<RegenerationOut, TutorError> {
  let ctx = state.wrong_answer_context(session_id, index).await?;
  Ok(regenerate(state, &ctx, verify).await.into())
}

/// Run the pipeline on a caller-supplied context.
#[instrument(level = "info", skip(state, ctx), fields(misconception_id = ?ctx.misconception_id))]
pub async fn regenerate(state: &AppState, ctx: &QuestionContext, verify: bool) -> RegenerationOutcome {
  let Some(controller) = &state.controller else {
    warn!(target: "regen", "Completion provider not configured; no question available");
    return RegenerationOutcome {
      status: RegenerationStatus::NoQuestionAvailable,
      question: None,
      verification: None,
      mismatch_count: 0,
      attempts: 0,
    };
  };

  let outcome = if verify && state.config.regeneration.verify {
    controller.run(ctx).await
  } else {
    controller.generate_unverified(ctx).await
  };
  info!(
    target: "regen",
    status = ?outcome.status,
    mismatch_count = outcome.mismatch_count,
    attempts = outcome.attempts,
    "Regeneration finished"
  );
  outcome
}
