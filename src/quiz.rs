//! Quiz bank and per-learner quiz sessions.
//!
//! The bank is the tabular question dataset (one row per question with four
//! answer texts and, optionally, one misconception id per wrong answer).
//! A session is an explicit object holding a learner's progress; nothing here
//! is global.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::catalog::MisconceptionCatalog;
use crate::domain::{ChoiceLetter, QuestionContext};
use crate::error::TutorError;
use crate::util::parse_misconception_id;

#[derive(Clone, Debug, Serialize)]
pub struct BankQuestion {
  pub id: String,
  pub construct_name: String,
  pub subject_name: String,
  pub question_text: String,
  pub correct: ChoiceLetter,
  pub answers: [String; 4],
  /// Misconception behind each answer letter; always None for the correct one.
  #[serde(skip)]
  pub misconceptions: [Option<i64>; 4],
}

impl BankQuestion {
  pub fn answer_text(&self, letter: ChoiceLetter) -> &str {
    &self.answers[letter as usize]
  }

  pub fn misconception_for(&self, letter: ChoiceLetter) -> Option<i64> {
    if letter == self.correct { None } else { self.misconceptions[letter as usize] }
  }
}

#[derive(Deserialize)]
struct BankRow {
  #[serde(rename = "QuestionId", default)] question_id: String,
  #[serde(rename = "ConstructName", default)] construct_name: String,
  #[serde(rename = "SubjectName", default)] subject_name: String,
  #[serde(rename = "QuestionText")] question_text: String,
  #[serde(rename = "CorrectAnswer")] correct_answer: String,
  #[serde(rename = "AnswerAText")] answer_a: String,
  #[serde(rename = "AnswerBText")] answer_b: String,
  #[serde(rename = "AnswerCText")] answer_c: String,
  #[serde(rename = "AnswerDText")] answer_d: String,
  #[serde(rename = "MisconceptionAId", default)] misconception_a: String,
  #[serde(rename = "MisconceptionBId", default)] misconception_b: String,
  #[serde(rename = "MisconceptionCId", default)] misconception_c: String,
  #[serde(rename = "MisconceptionDId", default)] misconception_d: String,
}

#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
  questions: Vec<BankQuestion>,
}

impl QuestionBank {
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, TutorError> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| TutorError::data_unavailable(&label, e))?;
    let bank = Self::from_reader(file, &label)?;
    info!(target: "tutor", path = %label, questions = bank.len(), "Loaded question bank");
    Ok(bank)
  }

  pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self, TutorError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut questions = Vec::new();
    for (i, row) in rdr.deserialize::<BankRow>().enumerate() {
      let row = row.map_err(|e| TutorError::data_unavailable(label, e))?;
      let Ok(correct) = ChoiceLetter::parse(&row.correct_answer) else {
        warn!(target: "tutor", row = i + 1, correct = %row.correct_answer, "Skipping question with invalid CorrectAnswer");
        continue;
      };
      let id = if row.question_id.is_empty() { format!("row-{}", i + 1) } else { row.question_id };
      questions.push(BankQuestion {
        id,
        construct_name: row.construct_name,
        subject_name: row.subject_name,
        question_text: row.question_text,
        correct,
        answers: [row.answer_a, row.answer_b, row.answer_c, row.answer_d],
        misconceptions: [
          parse_misconception_id(&row.misconception_a),
          parse_misconception_id(&row.misconception_b),
          parse_misconception_id(&row.misconception_c),
          parse_misconception_id(&row.misconception_d),
        ],
      });
    }
    Ok(Self { questions })
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.questions.is_empty()
  }

  /// `n` distinct questions (all of them when the bank is smaller).
  pub fn sample(&self, n: usize, seed: Option<u64>) -> Vec<BankQuestion> {
    let mut rng = match seed {
      Some(s) => StdRng::seed_from_u64(s),
      None => StdRng::from_entropy(),
    };
    self.questions.choose_multiple(&mut rng, n).cloned().collect()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStep {
  Quiz,
  Review,
}

#[derive(Clone, Debug, Serialize)]
pub struct WrongAnswer {
  pub question: BankQuestion,
  pub selected: ChoiceLetter,
  pub misconception_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnswerFeedback {
  pub correct: bool,
  pub expected: ChoiceLetter,
  pub step: QuizStep,
}

#[derive(Clone, Debug, Serialize)]
pub struct WrongAnswerReview {
  pub index: usize,
  pub question_text: String,
  pub correct: ChoiceLetter,
  pub selected: ChoiceLetter,
  pub misconception_id: Option<i64>,
  pub misconception: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuizReview {
  pub total: usize,
  pub correct: usize,
  pub wrong: usize,
  pub wrong_answers: Vec<WrongAnswerReview>,
}

#[derive(Clone, Debug)]
pub struct QuizSession {
  pub id: Uuid,
  pub questions: Vec<BankQuestion>,
  pub current: usize,
  pub step: QuizStep,
  pub wrong: Vec<WrongAnswer>,
  pub started_at: Instant,
  /// Set when the session enters `Review`.
  pub finished_at: Option<Instant>,
}

impl QuizSession {
  pub fn new(questions: Vec<BankQuestion>) -> Self {
    let now = Instant::now();
    let (step, finished_at) = if questions.is_empty() { (QuizStep::Review, Some(now)) } else { (QuizStep::Quiz, None) };
    Self { id: Uuid::new_v4(), questions, current: 0, step, wrong: Vec::new(), started_at: now, finished_at }
  }

  pub fn current_question(&self) -> Option<&BankQuestion> {
    match self.step {
      QuizStep::Quiz => self.questions.get(self.current),
      QuizStep::Review => None,
    }
  }

  /// Record the learner's answer to the current question and advance.
  pub fn answer(&mut self, letter: ChoiceLetter) -> Result<AnswerFeedback, TutorError> {
    let Some(q) = self.current_question().cloned() else {
      return Err(TutorError::InvalidInput("quiz is already finished".into()));
    };
    let correct = letter == q.correct;
    if !correct {
      let misconception_id = q.misconception_for(letter);
      self.wrong.push(WrongAnswer { question: q.clone(), selected: letter, misconception_id });
    }
    self.current += 1;
    if self.current >= self.questions.len() {
      self.step = QuizStep::Review;
      self.finished_at = Some(Instant::now());
      info!(target: "tutor", session = %self.id, wrong = self.wrong.len(), "Quiz finished");
    }
    Ok(AnswerFeedback { correct, expected: q.correct, step: self.step })
  }

  /// Context for regenerating a question from the `index`-th wrong answer.
  pub fn context_for(&self, index: usize) -> Option<QuestionContext> {
    let w = self.wrong.get(index)?;
    Some(QuestionContext {
      construct_name: w.question.construct_name.clone(),
      subject_name: w.question.subject_name.clone(),
      question_text: w.question.question_text.clone(),
      correct_answer_text: w.question.answer_text(w.question.correct).to_string(),
      wrong_answer_text: w.question.answer_text(w.selected).to_string(),
      misconception_id: w.misconception_id,
    })
  }

  pub fn review(&self, catalog: &MisconceptionCatalog) -> QuizReview {
    let wrong_answers = self
      .wrong
      .iter()
      .enumerate()
      .map(|(index, w)| WrongAnswerReview {
        index,
        question_text: w.question.question_text.clone(),
        correct: w.question.correct,
        selected: w.selected,
        misconception_id: w.misconception_id,
        misconception: catalog.lookup(w.misconception_id).map(str::to_string),
      })
      .collect();
    let answered = self.current.min(self.questions.len());
    QuizReview {
      total: self.questions.len(),
      correct: answered - self.wrong.len(),
      wrong: self.wrong.len(),
      wrong_answers,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::catalog::MisconceptionRecord;

  pub(crate) const BANK_CSV: &str = "QuestionId,ConstructName,SubjectName,CorrectAnswer,QuestionText,AnswerAText,AnswerBText,AnswerCText,AnswerDText,MisconceptionAId,MisconceptionBId,MisconceptionCId,MisconceptionDId\n\
    0,Calculate the area of a rectangle,Area of Simple Shapes,B,What is the area of a 3cm by 4cm rectangle?,14 cm,12 cm²,7 cm²,24 cm²,7.0,,,NaN\n\
    1,Add negative numbers,Negative Numbers,A,What is -3 + 5?,2,-8,8,-2,,12,,\n\
    2,Broken row,Nothing,E,?,a,b,c,d,,,,\n";

  pub(crate) fn bank() -> QuestionBank {
    QuestionBank::from_reader(BANK_CSV.as_bytes(), "bank").unwrap()
  }

  #[test]
  fn loads_rows_and_skips_invalid_answers() {
    let b = bank();
    assert_eq!(b.len(), 2);
    let q = &b.questions[0];
    assert_eq!(q.correct, ChoiceLetter::B);
    assert_eq!(q.answer_text(ChoiceLetter::D), "24 cm²");
    assert_eq!(q.misconception_for(ChoiceLetter::A), Some(7));
    assert_eq!(q.misconception_for(ChoiceLetter::C), None);
    assert_eq!(q.misconception_for(ChoiceLetter::D), None);
    assert_eq!(q.misconception_for(ChoiceLetter::B), None);
  }

  #[test]
  fn bank_without_misconception_columns_loads() {
    let csv = "QuestionId,QuestionText,CorrectAnswer,AnswerAText,AnswerBText,AnswerCText,AnswerDText\n9,What is 1+1?,C,1,3,2,4\n";
    let b = QuestionBank::from_reader(csv.as_bytes(), "test").unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b.questions[0].misconception_for(ChoiceLetter::A), None);
  }

  #[test]
  fn missing_required_column_is_data_unavailable() {
    let csv = "QuestionId,QuestionText\n1,What?\n";
    assert!(matches!(
      QuestionBank::from_reader(csv.as_bytes(), "x"),
      Err(TutorError::DataUnavailable { .. })
    ));
  }

  #[test]
  fn seeded_sampling_is_reproducible_and_bounded() {
    let b = bank();
    let ids = |qs: Vec<BankQuestion>| qs.into_iter().map(|q| q.id).collect::<Vec<_>>();
    assert_eq!(ids(b.sample(1, Some(42))), ids(b.sample(1, Some(42))));
    assert_eq!(b.sample(10, Some(1)).len(), 2);
  }

  #[test]
  fn session_records_wrong_answers_and_builds_context() {
    let mut s = QuizSession::new(bank().questions);
    let first = s.answer(ChoiceLetter::A).unwrap();
    assert!(!first.correct);
    assert_eq!(first.expected, ChoiceLetter::B);
    assert_eq!(first.step, QuizStep::Quiz);
    let second = s.answer(ChoiceLetter::A).unwrap();
    assert!(second.correct);
    assert_eq!(second.step, QuizStep::Review);
    assert!(s.finished_at.is_some());
    assert!(s.answer(ChoiceLetter::A).is_err());

    let ctx = s.context_for(0).unwrap();
    assert_eq!(ctx.question_text, "What is the area of a 3cm by 4cm rectangle?");
    assert_eq!(ctx.correct_answer_text, "12 cm²");
    assert_eq!(ctx.wrong_answer_text, "14 cm");
    assert_eq!(ctx.misconception_id, Some(7));
    assert!(s.context_for(1).is_none());

    let catalog = MisconceptionCatalog::from_records([MisconceptionRecord { id: 7, description: "Confuses area and perimeter".into() }]);
    let review = s.review(&catalog);
    assert_eq!((review.total, review.correct, review.wrong), (2, 1, 1));
    assert_eq!(review.wrong_answers[0].misconception.as_deref(), Some("Confuses area and perimeter"));
  }
}
