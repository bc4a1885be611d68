//! Error kinds surfaced by the tutor pipeline.
//!
//! Only conditions that stop an operation are errors. Incomplete parses, empty
//! verification votes and exhausted retries are ordinary outcomes and live in
//! the domain types instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TutorError {
  /// A tabular resource (catalog, question bank) could not be read or is corrupt.
  #[error("data unavailable at {path}: {reason}")]
  DataUnavailable { path: String, reason: String },

  /// Caller supplied a malformed request (blank context fields, bad letter, ...).
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// Unknown quiz session or wrong-answer index.
  #[error("not found: {0}")]
  NotFound(String),

  /// Transport failure talking to the completion service, timeouts included.
  #[error("completion service unavailable: {0}")]
  ServiceUnavailable(String),

  /// The completion service answered with a non-success status.
  #[error("completion service error (HTTP {status}): {message}")]
  ServiceError { status: u16, message: String },
}

impl TutorError {
  pub fn data_unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
    TutorError::DataUnavailable { path: path.into(), reason: reason.to_string() }
  }
}

impl From<reqwest::Error> for TutorError {
  fn from(e: reqwest::Error) -> Self {
    match e.status() {
      Some(status) if !status.is_success() => TutorError::ServiceError {
        status: status.as_u16(),
        message: e.to_string(),
      },
      // connect, timeout, body and decode failures all mean "no usable answer from the wire"
      _ => TutorError::ServiceUnavailable(e.to_string()),
    }
  }
}
