//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::TutorError;
use crate::logic;
use crate::protocol::{ClientWsMessage, RegenerationOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "tutor", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "tutor", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "tutor", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tutor", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tutor", "WebSocket disconnected");
}

fn err(e: TutorError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartQuiz => match logic::start_quiz(state).await {
      Ok(session) => {
        info!(target: "tutor", session = %session.session_id, total = session.total, "WS quiz started");
        ServerWsMessage::Session { session }
      }
      Err(e) => err(e),
    },

    ClientWsMessage::SubmitAnswer { session_id, answer } => {
      match logic::submit_answer(state, session_id, &answer).await {
        Ok(result) => {
          info!(target: "tutor", session = %session_id, correct = result.correct, "WS submit_answer evaluated");
          ServerWsMessage::AnswerResult { result }
        }
        Err(e) => err(e),
      }
    }

    ClientWsMessage::Review { session_id } => match logic::review(state, session_id).await {
      Ok(review) => ServerWsMessage::Review { review },
      Err(e) => err(e),
    },

    ClientWsMessage::SimilarQuestion { session_id, index } => {
      match logic::similar_for_wrong_answer(state, session_id, index, false).await {
        Ok(result) => ServerWsMessage::Regeneration { result },
        Err(e) => err(e),
      }
    }

    ClientWsMessage::Regenerate { session_id, index } => {
      match logic::similar_for_wrong_answer(state, session_id, index, true).await {
        Ok(result) => {
          info!(target: "regen", session = %session_id, index, status = ?result.status, "WS regeneration served");
          ServerWsMessage::Regeneration { result }
        }
        Err(e) => err(e),
      }
    }

    ClientWsMessage::Generate { context } => match context.validate() {
      Ok(()) => {
        let result: RegenerationOut = logic::regenerate(state, &context, true).await.into();
        ServerWsMessage::Regeneration { result }
      }
      Err(e) => err(e),
    },
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::{json, Value};

  use super::handle_client_ws;
  use crate::catalog::{MisconceptionCatalog, MisconceptionRecord};
  use crate::config::TutorConfig;
  use crate::generator::tests::GENERATED_B;
  use crate::llm::testing::ScriptedProvider;
  use crate::protocol::ClientWsMessage;
  use crate::quiz::tests::bank;
  use crate::state::AppState;

  fn state(provider: Option<Arc<ScriptedProvider>>) -> AppState {
    let mut config = TutorConfig::default();
    config.quiz.seed = Some(3);
    config.regeneration.num_inferences = 2;
    let catalog = MisconceptionCatalog::from_records([MisconceptionRecord {
      id: 7,
      description: "Confuses area and perimeter".into(),
    }]);
    let provider = provider.map(|p| p as Arc<dyn crate::llm::CompletionProvider>);
    AppState::with_parts(catalog, bank(), provider, config)
  }

  async fn send(state: &AppState, msg: Value) -> Value {
    let msg: ClientWsMessage = serde_json::from_value(msg).unwrap();
    serde_json::to_value(handle_client_ws(msg, state).await).unwrap()
  }

  #[tokio::test]
  async fn ping_pong() {
    let out = send(&state(None), json!({ "type": "ping" })).await;
    assert_eq!(out, json!({ "type": "pong" }));
  }

  #[tokio::test]
  async fn quiz_round_trip_over_ws() {
    let provider = Arc::new(ScriptedProvider::texts([GENERATED_B]).with_default("Answer: (B)"));
    let st = state(Some(provider.clone()));

    let started = send(&st, json!({ "type": "start_quiz" })).await;
    assert_eq!(started["type"], json!("session"));
    let id = started["session"]["sessionId"].as_str().unwrap().to_string();

    for _ in 0..2 {
      let out = send(&st, json!({ "type": "submit_answer", "sessionId": id, "answer": "A" })).await;
      assert_eq!(out["type"], json!("answer_result"));
    }

    let review = send(&st, json!({ "type": "review", "sessionId": id })).await;
    assert_eq!(review["review"]["wrong"], json!(1));

    let regen = send(&st, json!({ "type": "regenerate", "sessionId": id, "index": 0 })).await;
    assert_eq!(regen["type"], json!("regeneration"));
    assert_eq!(regen["result"]["status"], json!("accepted"));
    assert_eq!(provider.calls(), 3);
  }

  #[tokio::test]
  async fn unknown_session_becomes_error_message() {
    let out = send(
      &state(None),
      json!({ "type": "review", "sessionId": uuid::Uuid::new_v4() }),
    )
    .await;
    assert_eq!(out["type"], json!("error"));
    assert!(out["message"].as_str().unwrap().contains("not found"));
  }

  #[tokio::test]
  async fn generate_rejects_blank_context() {
    let out = send(
      &state(None),
      json!({ "type": "generate", "context": { "question_text": "  ", "correct_answer_text": "1", "wrong_answer_text": "2" } }),
    )
    .await;
    assert_eq!(out["type"], json!("error"));
  }
}
