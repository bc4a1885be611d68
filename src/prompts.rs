//! Prompt builders for question generation and answer verification.
//!
//! Both render into the same Llama-3 style role-delimited frame; the texts
//! inside come from `Prompts` (defaults or TOML overrides).

use crate::config::Prompts;
use crate::domain::{ChoiceLetter, GeneratedQuestion, QuestionContext};
use crate::util::fill_template;

fn render_chat(system: &str, user: &str) -> String {
  format!(
    "<|begin_of_text|>\n\
     <|start_header_id|>system<|end_header_id|>\n\
     {system}\n\
     <|eot_id|>\n\
     <|start_header_id|>user<|end_header_id|>\n\
     {user}\n\
     <|eot_id|>\n\
     <|start_header_id|>assistant<|end_header_id|>",
    system = system.trim(),
    user = user.trim(),
  )
}

/// Prompt asking for a similar question. The misconception clause is omitted
/// entirely when there is no misconception text.
pub fn build_generation_prompt(prompts: &Prompts, ctx: &QuestionContext, misconception: Option<&str>) -> String {
  let clause = match misconception {
    Some(text) if !text.trim().is_empty() => {
      format!(" that targets the following misconception: \"{}\".", text.trim())
    }
    _ => ".".to_string(),
  };
  let system = fill_template(&prompts.generation_system, &[("misconception_clause", &clause)]);
  let user = fill_template(
    &prompts.generation_user_template,
    &[
      ("construct_name", &ctx.construct_name),
      ("subject_name", &ctx.subject_name),
      ("question_text", &ctx.question_text),
      ("correct_answer_text", &ctx.correct_answer_text),
      ("wrong_answer_text", &ctx.wrong_answer_text),
    ],
  );
  render_chat(&system, &user)
}

/// Prompt asking the model to answer a question with a bare `Answer: X`.
pub fn build_verification_prompt(prompts: &Prompts, question: &GeneratedQuestion) -> String {
  let user = fill_template(
    &prompts.verification_user_template,
    &[
      ("question", &question.question),
      ("choice_a", question.choice(ChoiceLetter::A)),
      ("choice_b", question.choice(ChoiceLetter::B)),
      ("choice_c", question.choice(ChoiceLetter::C)),
      ("choice_d", question.choice(ChoiceLetter::D)),
    ],
  );
  render_chat(&prompts.verification_system, &user)
}
