//! Error taxonomy of the generation pipeline.
//!
//! Scope of each error:
//!   - `CatalogError`      : whole run (emit `error`, stop)
//!   - `GenerateError`     : one combination (emit `combination_error`, continue)
//!   - `MalformedResponse` : one combination
//!   - `ValidationError`   : one item (drop it, keep siblings)
//!   - `PersistError`      : one item (one retry on duplicate key, then drop)

use thiserror::Error;

/// Catalog could not be read. Fatal for the batch.
#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("catalog unavailable: {0}")]
  Unavailable(String),
}

/// One provider call failed. The fallback chain moves on to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("request timed out after {0}s")]
  Timeout(u64),
  #[error("malformed response envelope: {0}")]
  Envelope(String),
}

impl ProviderError {
  /// Map a reqwest failure, keeping timeouts distinguishable.
  pub fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
    if e.is_timeout() {
      ProviderError::Timeout(timeout_secs)
    } else {
      ProviderError::Transport(e.to_string())
    }
  }
}

/// Outcome of running the whole fallback chain for one prompt.
#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("all providers exhausted: {}", format_attempts(.attempts))]
  AllProvidersExhausted { attempts: Vec<(String, ProviderError)> },
  #[error("generation cancelled")]
  Cancelled,
}

fn format_attempts(attempts: &[(String, ProviderError)]) -> String {
  if attempts.is_empty() {
    return "no providers configured".into();
  }
  attempts
    .iter()
    .map(|(name, e)| format!("{name}: {e}"))
    .collect::<Vec<_>>()
    .join("; ")
}

#[derive(Debug, Error)]
#[error("malformed model response: {reason}")]
pub struct MalformedResponse {
  pub reason: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("item is not a JSON object")]
  NotAnObject,
  #[error("missing required field '{0}'")]
  MissingField(&'static str),
  #[error("field '{0}' has the wrong type")]
  WrongType(&'static str),
  #[error("options must contain at least two entries (got {0})")]
  TooFewOptions(usize),
  #[error("options contain a duplicate entry '{0}'")]
  DuplicateOption(String),
  #[error("correct_answer '{0}' is not one of the options")]
  AnswerNotInOptions(String),
  #[error("{field} '{got}' does not match combination value '{expected}'")]
  Drift { field: &'static str, expected: String, got: String },
}

#[derive(Debug, Error)]
pub enum PersistError {
  #[error("duplicate question_id '{0}'")]
  DuplicateKey(String),
  #[error("database error: {0}")]
  Database(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to parse config file {path}: {source}")]
  Parse { path: String, source: toml::de::Error },
}
