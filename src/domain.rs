//! Domain models: choice letters, the wrong-answer context, generated questions
//! and verification results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TutorError;

/// One of the four multiple-choice slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChoiceLetter {
  A,
  B,
  C,
  D,
}

impl ChoiceLetter {
  pub const ALL: [ChoiceLetter; 4] = [ChoiceLetter::A, ChoiceLetter::B, ChoiceLetter::C, ChoiceLetter::D];

  pub fn from_char(ch: char) -> Option<Self> {
    match ch.to_ascii_uppercase() {
      'A' => Some(ChoiceLetter::A),
      'B' => Some(ChoiceLetter::B),
      'C' => Some(ChoiceLetter::C),
      'D' => Some(ChoiceLetter::D),
      _ => None,
    }
  }

  /// Strict parse of a single letter, surrounding whitespace allowed.
  pub fn parse(s: &str) -> Result<Self, TutorError> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
      (Some(ch), None) => Self::from_char(ch)
        .ok_or_else(|| TutorError::InvalidInput(format!("not a choice letter: {:?}", s))),
      _ => Err(TutorError::InvalidInput(format!("not a choice letter: {:?}", s))),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ChoiceLetter::A => "A",
      ChoiceLetter::B => "B",
      ChoiceLetter::C => "C",
      ChoiceLetter::D => "D",
    }
  }
}

impl fmt::Display for ChoiceLetter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The wrong-answer event a similar question is generated from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuestionContext {
  #[serde(default)] pub construct_name: String,
  #[serde(default)] pub subject_name: String,
  pub question_text: String,
  pub correct_answer_text: String,
  pub wrong_answer_text: String,
  #[serde(default)] pub misconception_id: Option<i64>,
}

impl QuestionContext {
  /// Construct and subject may be blank; the question and both answers may not.
  pub fn validate(&self) -> Result<(), TutorError> {
    let required = [
      ("question_text", &self.question_text),
      ("correct_answer_text", &self.correct_answer_text),
      ("wrong_answer_text", &self.wrong_answer_text),
    ];
    let blank: Vec<&str> = required
      .iter()
      .filter(|(_, v)| v.trim().is_empty())
      .map(|(k, _)| *k)
      .collect();
    if blank.is_empty() {
      Ok(())
    } else {
      Err(TutorError::InvalidInput(format!("blank context fields: {}", blank.join(", "))))
    }
  }
}

/// A question produced by the model. Fields stay empty when the model left them out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
  pub question: String,
  pub choices: BTreeMap<ChoiceLetter, String>,
  /// Raw label as the model wrote it, e.g. "B" or "B) 12".
  pub correct_answer: String,
  pub explanation: String,
}

impl GeneratedQuestion {
  /// Names of the fields the model failed to provide.
  pub fn missing_fields(&self) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if self.question.is_empty() { missing.push("question"); }
    for letter in ChoiceLetter::ALL {
      if !self.choices.contains_key(&letter) {
        missing.push(match letter {
          ChoiceLetter::A => "choice_a",
          ChoiceLetter::B => "choice_b",
          ChoiceLetter::C => "choice_c",
          ChoiceLetter::D => "choice_d",
        });
      }
    }
    if self.correct_answer.is_empty() { missing.push("correct_answer"); }
    if self.explanation.is_empty() { missing.push("explanation"); }
    missing
  }

  pub fn is_complete(&self) -> bool {
    self.missing_fields().is_empty()
  }

  /// The stated correct letter with incidental punctuation removed
  /// ("b)", "(B)", "**B**", "[B]" -> B).
  pub fn stated_letter(&self) -> Option<ChoiceLetter> {
    let s = self.correct_answer.trim().trim_start_matches(|c| matches!(c, '(' | '[' | '*')).trim_start();
    let head = s.split(|c| matches!(c, ')' | ']')).next().unwrap_or("");
    let head = head.trim().trim_end_matches(|c| matches!(c, '.' | ':' | '*')).trim();
    ChoiceLetter::parse(head).ok()
  }

  pub fn choice(&self, letter: ChoiceLetter) -> &str {
    self.choices.get(&letter).map(String::as_str).unwrap_or("")
  }
}

/// Renders the question in the same line format the model is asked to produce.
impl fmt::Display for GeneratedQuestion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Question: {}", self.question)?;
    for (letter, text) in &self.choices {
      writeln!(f, "{}) {}", letter, text)?;
    }
    writeln!(f, "Correct Answer: {}", self.correct_answer)?;
    write!(f, "Explanation: {}", self.explanation)
  }
}

/// Outcome of a self-consistency check over several sampled answers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
  /// Majority letter; `None` when no run produced an extractable answer.
  pub answer: Option<ChoiceLetter>,
  /// Extracted letters in logical call order.
  pub votes: Vec<ChoiceLetter>,
  pub counts: BTreeMap<ChoiceLetter, usize>,
  pub runs: usize,
  pub failed_runs: usize,
}

impl VerificationResult {
  /// Empty string means "undetermined".
  pub fn answer_letter(&self) -> &'static str {
    self.answer.map(|l| l.as_str()).unwrap_or("")
  }

  pub fn trace(&self) -> String {
    let Some(answer) = self.answer else {
      let mut out = format!("No valid answers extracted from {} runs.", self.runs);
      if self.failed_runs > 0 {
        out.push_str(&format!(" ({} runs failed)", self.failed_runs));
      }
      return out;
    };
    let votes: Vec<&str> = self.votes.iter().map(|l| l.as_str()).collect();
    let counts: Vec<String> = self.counts.iter().map(|(l, n)| format!("{}: {}", l, n)).collect();
    let mut out = format!(
      "All answers: [{}], counts: {{{}}}, final: {}",
      votes.join(", "),
      counts.join(", "),
      answer
    );
    if self.failed_runs > 0 {
      out.push_str(&format!(", failed runs: {}", self.failed_runs));
    }
    out
  }
}
