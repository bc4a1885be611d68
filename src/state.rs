//! Application state: catalog, question bank, quiz sessions and the regeneration pipeline.
//!
//! This module owns:
//!   - the read-only misconception catalog (shared by every session)
//!   - the quiz question bank
//!   - in-memory quiz sessions keyed by id
//!   - the optional regeneration controller (absent when no provider is configured)
//!
//! No lock is held across a model call: session data is cloned out first.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::catalog::MisconceptionCatalog;
use crate::config::TutorConfig;
use crate::consistency::SelfConsistencyChecker;
use crate::domain::{ChoiceLetter, QuestionContext};
use crate::error::TutorError;
use crate::generator::SimilarQuestionGenerator;
use crate::llm::{provider_from_config, CompletionProvider};
use crate::quiz::{AnswerFeedback, QuestionBank, QuizReview, QuizSession};
use crate::regeneration::RegenerationController;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<MisconceptionCatalog>,
    pub bank: Arc<QuestionBank>,
    pub sessions: Arc<RwLock<HashMap<Uuid, QuizSession>>>,
    pub controller: Option<RegenerationController>,
    pub config: TutorConfig,
}

impl AppState {
    /// Build state from config: load the catalog (fatal on failure), the question bank
    /// (empty on failure) and the completion provider.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(config: TutorConfig) -> Result<Self, TutorError> {
        let catalog = MisconceptionCatalog::from_csv_path(&config.data.misconception_csv)?;

        let bank = match QuestionBank::from_csv_path(&config.data.questions_csv) {
            Ok(b) => b,
            Err(e) => {
                error!(target: "tutor", error = %e, "Question bank unavailable; quizzes disabled");
                QuestionBank::default()
            }
        };

        let provider = provider_from_config(&config.provider);
        if provider.is_none() {
            info!(target: "tutor", "No completion provider; similar-question generation disabled.");
        }

        Ok(Self::with_parts(catalog, bank, provider, config))
    }

    pub fn with_parts(
        catalog: MisconceptionCatalog,
        bank: QuestionBank,
        provider: Option<Arc<dyn CompletionProvider>>,
        config: TutorConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let controller = provider.map(|provider| {
            let generator =
                SimilarQuestionGenerator::new(catalog.clone(), provider.clone(), config.prompts.clone());
            let checker = SelfConsistencyChecker::new(
                provider,
                config.prompts.clone(),
                config.regeneration.concurrency,
            );
            RegenerationController::new(generator, checker).with_limits(
                config.regeneration.max_retries,
                config.regeneration.num_inferences,
            )
        });

        info!(
            target: "tutor",
            misconceptions = catalog.len(),
            questions = bank.len(),
            completion = controller.is_some(),
            verify = config.regeneration.verify,
            "Startup inventory"
        );

        Self {
            catalog,
            bank: Arc::new(bank),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            controller,
            config,
        }
    }

    /// Start a quiz over a fresh sample of the bank.
    #[instrument(level = "info", skip(self))]
    pub async fn start_session(&self) -> Result<QuizSession, TutorError> {
        if self.bank.is_empty() {
            return Err(TutorError::InvalidInput("question bank is empty".into()));
        }
        let questions = self.bank.sample(self.config.quiz.length, self.config.quiz.seed);
        let session = QuizSession::new(questions);
        info!(target: "tutor", session = %session.id, questions = session.questions.len(), "Quiz started");
        let mut sessions = self.sessions.write().await;
        evict_sessions(
            &mut sessions,
            Instant::now(),
            Duration::from_secs(self.config.quiz.session_ttl_secs),
            self.config.quiz.max_sessions,
        );
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Read-only snapshot of a session.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: Uuid) -> Result<QuizSession, TutorError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TutorError::NotFound(format!("session {}", id)))
    }

    #[instrument(level = "debug", skip(self), fields(%id, %letter))]
    pub async fn answer(&self, id: Uuid, letter: ChoiceLetter) -> Result<(AnswerFeedback, QuizSession), TutorError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| TutorError::NotFound(format!("session {}", id)))?;
        let feedback = session.answer(letter)?;
        Ok((feedback, session.clone()))
    }

    pub async fn review(&self, id: Uuid) -> Result<QuizReview, TutorError> {
        Ok(self.get_session(id).await?.review(&self.catalog))
    }

    /// Regeneration context for a recorded wrong answer.
    pub async fn wrong_answer_context(&self, id: Uuid, index: usize) -> Result<QuestionContext, TutorError> {
        self.get_session(id)
            .await?
            .context_for(index)
            .ok_or_else(|| TutorError::NotFound(format!("wrong answer #{} in session {}", index, id)))
    }
}

/// Drop finished sessions older than `ttl`, then the oldest sessions until
/// there is room for one more under `max`. Returns how many were dropped.
fn evict_sessions(sessions: &mut HashMap<Uuid, QuizSession>, now: Instant, ttl: Duration, max: usize) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| match s.finished_at {
        Some(done) => now.saturating_duration_since(done) < ttl,
        None => true,
    });

    let max = max.max(1);
    if sessions.len() >= max {
        let mut by_age: Vec<(Instant, Uuid)> = sessions.iter().map(|(id, s)| (s.started_at, *id)).collect();
        by_age.sort();
        for (_, id) in by_age.into_iter().take(sessions.len() + 1 - max) {
            sessions.remove(&id);
        }
    }

    let dropped = before - sessions.len();
    if dropped > 0 {
        debug!(target: "tutor", dropped, live = sessions.len(), "Evicted quiz sessions");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::tests::bank;

    fn session(started: Instant, finished: Option<Instant>) -> QuizSession {
        let mut s = QuizSession::new(bank().sample(10, Some(1)));
        s.started_at = started;
        s.finished_at = finished;
        s
    }

    fn map(items: Vec<QuizSession>) -> HashMap<Uuid, QuizSession> {
        items.into_iter().map(|s| (s.id, s)).collect()
    }

    #[test]
    fn finished_sessions_expire_after_ttl() {
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);
        let stale = session(t0, Some(t0));
        let fresh = session(t0, Some(t0 + Duration::from_secs(100)));
        let active = session(t0, None);
        let (fresh_id, active_id) = (fresh.id, active.id);
        let mut sessions = map(vec![stale, fresh, active]);

        let dropped = evict_sessions(&mut sessions, t0 + Duration::from_secs(120), ttl, 100);
        assert_eq!(dropped, 1);
        assert!(sessions.contains_key(&fresh_id));
        assert!(sessions.contains_key(&active_id));
    }

    #[test]
    fn cap_drops_oldest_first() {
        let t0 = Instant::now();
        let oldest = session(t0, None);
        let middle = session(t0 + Duration::from_secs(1), None);
        let newest = session(t0 + Duration::from_secs(2), None);
        let (middle_id, newest_id) = (middle.id, newest.id);
        let mut sessions = map(vec![newest, oldest, middle]);

        // room for one incoming session under a cap of 3
        let dropped = evict_sessions(&mut sessions, t0 + Duration::from_secs(3), Duration::from_secs(3600), 3);
        assert_eq!(dropped, 1);
        assert_eq!(sessions.len(), 2);
        assert!(sessions.contains_key(&middle_id));
        assert!(sessions.contains_key(&newest_id));
    }

    #[tokio::test]
    async fn start_session_prunes_under_cap() {
        let mut config = TutorConfig::default();
        config.quiz.max_sessions = 2;
        let state = AppState::with_parts(MisconceptionCatalog::default(), bank(), None, config);
        let mut last = None;
        for _ in 0..4 {
            last = Some(state.start_session().await.unwrap().id);
        }
        assert_eq!(state.sessions.read().await.len(), 2);
        assert!(state.get_session(last.unwrap()).await.is_ok());
    }
}
