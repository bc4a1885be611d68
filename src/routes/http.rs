//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::QuestionContext;
use crate::error::TutorError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// Maps pipeline errors onto HTTP statuses with a JSON body.
pub struct ApiError(pub TutorError);

impl From<TutorError> for ApiError {
  fn from(e: TutorError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      TutorError::NotFound(_) => StatusCode::NOT_FOUND,
      TutorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      TutorError::DataUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      TutorError::ServiceUnavailable(_) | TutorError::ServiceError { .. } => StatusCode::BAD_GATEWAY,
    };
    warn!(target: "tutor", %status, error = %self.0, "Request failed");
    (status, Json(ErrorOut { error: self.0.to_string() })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    completion_enabled: state.controller.is_some(),
    misconceptions: state.catalog.len(),
    questions: state.bank.len(),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_quiz(State(state): State<Arc<AppState>>) -> Result<Json<SessionOut>, ApiError> {
  let out = logic::start_quiz(&state).await?;
  info!(target: "tutor", session = %out.session_id, total = out.total, "HTTP quiz started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, ApiError> {
  Ok(Json(logic::session_status(&state, id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%id, answer = %body.answer))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let out = logic::submit_answer(&state, id, &body.answer).await?;
  info!(target: "tutor", session = %id, correct = out.correct, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_review(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::review(&state, id).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_similar(
  State(state): State<Arc<AppState>>,
  Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<RegenerationOut>, ApiError> {
  let out = logic::similar_for_wrong_answer(&state, id, index, false).await?;
  info!(target: "regen", session = %id, index, status = ?out.status, "HTTP similar question served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_regenerate(
  State(state): State<Arc<AppState>>,
  Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<RegenerationOut>, ApiError> {
  let out = logic::similar_for_wrong_answer(&state, id, index, true).await?;
  info!(target: "regen", session = %id, index, status = ?out.status, mismatches = out.mismatch_count, "HTTP regeneration served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, ctx), fields(misconception_id = ?ctx.misconception_id))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(ctx): Json<QuestionContext>,
) -> Result<Json<RegenerationOut>, ApiError> {
  ctx.validate()?;
  let out: RegenerationOut = logic::regenerate(&state, &ctx, true).await.into();
  Ok(Json(out))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
  };
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use crate::catalog::{MisconceptionCatalog, MisconceptionRecord};
  use crate::config::TutorConfig;
  use crate::generator::tests::GENERATED_B;
  use crate::llm::testing::ScriptedProvider;
  use crate::quiz::tests::bank;
  use crate::routes::build_router;
  use crate::state::AppState;

  fn app(provider: Option<Arc<ScriptedProvider>>) -> Router {
    let mut config = TutorConfig::default();
    config.quiz.seed = Some(7);
    config.regeneration.num_inferences = 3;
    let catalog = MisconceptionCatalog::from_records([MisconceptionRecord {
      id: 7,
      description: "Confuses area and perimeter".into(),
    }]);
    let provider = provider.map(|p| p as Arc<dyn crate::llm::CompletionProvider>);
    build_router(Arc::new(AppState::with_parts(catalog, bank(), provider, config)))
  }

  async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header("content-type", "application/json")
      .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
      .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  /// Answers "A" throughout: wrong (misconception 7) on the area question, right on the other.
  async fn finish_quiz_with_one_wrong(app: &Router) -> String {
    let (status, session) = call(app, "POST", "/api/v1/quiz", None).await;
    assert_eq!(status, StatusCode::OK);
    let id = session["sessionId"].as_str().unwrap().to_string();
    assert!(session["question"]["choices"]["A"].is_string());
    assert!(session["question"].get("correct").is_none());

    let mut question = session["question"].clone();
    let mut wrong_recorded = false;
    while !question.is_null() {
      let (status, out) = call(app, "POST", &format!("/api/v1/quiz/{id}/answer"), Some(json!({ "answer": "A" }))).await;
      assert_eq!(status, StatusCode::OK);
      if out["correct"] == json!(false) {
        wrong_recorded = true;
      }
      question = out["next"].clone();
    }
    assert!(wrong_recorded);
    id
  }

  #[tokio::test]
  async fn health_reports_inventory() {
    let (status, body) = call(&app(None), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completion_enabled"], json!(false));
    assert_eq!(body["misconceptions"], json!(1));
    assert_eq!(body["questions"], json!(2));
  }

  #[tokio::test]
  async fn quiz_flow_then_verified_regeneration() {
    let provider = Arc::new(
      ScriptedProvider::texts([GENERATED_B]).with_default("Answer: B"),
    );
    let app = app(Some(provider.clone()));
    let id = finish_quiz_with_one_wrong(&app).await;

    let (status, review) = call(&app, "GET", &format!("/api/v1/quiz/{id}/review"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["total"], json!(2));
    assert_eq!(review["wrong"], json!(1));
    assert_eq!(review["wrong_answers"][0]["misconception"], json!("Confuses area and perimeter"));

    let (status, out) = call(&app, "POST", &format!("/api/v1/quiz/{id}/wrong/0/regenerate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["status"], json!("accepted"));
    assert_eq!(out["verified_answer"], json!("B"));
    assert_eq!(out["mismatch_count"], json!(0));
    assert_eq!(out["question"]["choices"]["B"], json!("24 m²"));
    // 1 generation + 3 verification runs
    assert_eq!(provider.calls(), 4);
  }

  #[tokio::test]
  async fn similar_without_provider_reports_no_question() {
    let app = app(None);
    let id = finish_quiz_with_one_wrong(&app).await;
    let (status, out) = call(&app, "POST", &format!("/api/v1/quiz/{id}/wrong/0/similar"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["status"], json!("no_question_available"));
    assert!(out["question"].is_null());
  }

  #[tokio::test]
  async fn unknown_session_and_index_are_404() {
    let app = app(None);
    let (status, body) = call(&app, "GET", &format!("/api/v1/quiz/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("session"));

    let id = finish_quiz_with_one_wrong(&app).await;
    let (status, _) = call(&app, "POST", &format!("/api/v1/quiz/{id}/wrong/5/similar"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn bad_answer_letter_is_400() {
    let app = app(None);
    let (_, session) = call(&app, "POST", "/api/v1/quiz", None).await;
    let id = session["sessionId"].as_str().unwrap();
    let (status, _) = call(&app, "POST", &format!("/api/v1/quiz/{id}/answer"), Some(json!({ "answer": "Z" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn generate_endpoint_validates_context() {
    let app = app(None);
    let (status, _) = call(
      &app,
      "POST",
      "/api/v1/generate",
      Some(json!({ "question_text": "", "correct_answer_text": "1", "wrong_answer_text": "2", "misconception_id": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
