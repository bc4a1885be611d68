//! MisconceptTutor · misconception-targeted question regeneration
//!
//! - Axum HTTP + WebSocket API over a diagnostic quiz
//! - Similar-question generation for wrong answers via a hosted completion model
//! - Self-consistency verification with bounded retries
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   TUTOR_CONFIG_PATH   : path to TOML config (data paths, provider, prompts, limits)
//!   HUGGINGFACE_API_KEY : token for the hosted inference API (provider kind "huggingface")
//!   OPENAI_API_KEY      : optional bearer token (provider kind "openai_compatible")
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod catalog;
mod prompts;
mod llm;
mod parser;
mod generator;
mod consistency;
mod regeneration;
mod quiz;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::load_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Missing or unreadable config falls back to defaults; a missing catalog is fatal.
  let config = load_config_from_env().unwrap_or_default();
  let state = Arc::new(AppState::from_config(config)?);

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutor", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
