//! Line-oriented parser for generated questions.
//!
//! Recognised line prefixes (case-insensitive, surrounding whitespace ignored):
//! `Question:`, `A)`..`D)`, `Correct Answer:`, `Explanation:`. Everything else
//! is skipped. The parser never fails; missing fields stay empty and are
//! reported as a warning.

use tracing::{debug, warn};

use crate::domain::{ChoiceLetter, GeneratedQuestion};
use crate::util::trunc_for_log;

fn labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
  let head = line.get(..label.len())?;
  if head.eq_ignore_ascii_case(label) {
    Some(line[label.len()..].trim())
  } else {
    None
  }
}

fn choice_line(line: &str) -> Option<(ChoiceLetter, &str)> {
  let mut chars = line.chars();
  let letter = ChoiceLetter::from_char(chars.next()?)?;
  if chars.next()? != ')' {
    return None;
  }
  Some((letter, line[2..].trim()))
}

pub fn parse_model_output(raw: &str) -> GeneratedQuestion {
  let mut q = GeneratedQuestion::default();

  for line in raw.trim().lines() {
    let line = line.trim();

    if let Some(rest) = labelled(line, "question:") {
      q.question = rest.to_string();
    } else if let Some((letter, text)) = choice_line(line) {
      q.choices.insert(letter, text.to_string());
    } else if let Some(rest) = labelled(line, "correct answer:") {
      q.correct_answer = rest.to_string();
    } else if let Some(rest) = labelled(line, "explanation:") {
      q.explanation = rest.to_string();
    }
  }

  let missing = q.missing_fields();
  if missing.is_empty() {
    debug!(target: "regen", "Parsed complete generated question");
  } else {
    warn!(target: "regen", missing = ?missing, raw = %trunc_for_log(raw, 300), "Incomplete generated question");
  }
  q
}
