//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChoiceLetter, GeneratedQuestion, QuestionContext};
use crate::quiz::{AnswerFeedback, BankQuestion, QuizReview, QuizSession, QuizStep};
use crate::regeneration::{RegenerationOutcome, RegenerationStatus};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartQuiz,
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        answer: String,
    },
    Review {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    SimilarQuestion {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        index: usize,
    },
    Regenerate {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        index: usize,
    },
    Generate {
        context: QuestionContext,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    AnswerResult {
        result: AnswerOut,
    },
    Review {
        review: QuizReview,
    },
    Regeneration {
        result: RegenerationOut,
    },
    Error {
        message: String,
    },
}

/// A bank question as shown to the learner (no answer key).
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub construct_name: String,
    pub subject_name: String,
    pub question_text: String,
    pub choices: BTreeMap<ChoiceLetter, String>,
}

impl From<&BankQuestion> for QuestionOut {
    fn from(q: &BankQuestion) -> Self {
        Self {
            id: q.id.clone(),
            construct_name: q.construct_name.clone(),
            subject_name: q.subject_name.clone(),
            question_text: q.question_text.clone(),
            choices: ChoiceLetter::ALL
                .iter()
                .map(|l| (*l, q.answer_text(*l).to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub step: QuizStep,
    pub index: usize,
    pub total: usize,
    pub question: Option<QuestionOut>,
}

impl From<&QuizSession> for SessionOut {
    fn from(s: &QuizSession) -> Self {
        Self {
            session_id: s.id,
            step: s.step,
            index: s.current,
            total: s.questions.len(),
            question: s.current_question().map(QuestionOut::from),
        }
    }
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub correct: bool,
    pub expected: ChoiceLetter,
    pub step: QuizStep,
    pub next: Option<QuestionOut>,
}

impl AnswerOut {
    pub fn new(feedback: &AnswerFeedback, session: &QuizSession) -> Self {
        Self {
            correct: feedback.correct,
            expected: feedback.expected,
            step: feedback.step,
            next: session.current_question().map(QuestionOut::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegenerationOut {
    pub status: RegenerationStatus,
    pub question: Option<GeneratedQuestion>,
    /// Majority letter from the verifier, "" when undetermined or not verified.
    pub verified_answer: String,
    pub trace: String,
    pub mismatch_count: u32,
    pub attempts: u32,
}

impl From<RegenerationOutcome> for RegenerationOut {
    fn from(o: RegenerationOutcome) -> Self {
        Self {
            verified_answer: o
                .verification
                .as_ref()
                .map(|v| v.answer_letter().to_string())
                .unwrap_or_default(),
            trace: o.trace(),
            status: o.status,
            question: o.question,
            mismatch_count: o.mismatch_count,
            attempts: o.attempts,
        }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub completion_enabled: bool,
    pub misconceptions: usize,
    pub questions: usize,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
