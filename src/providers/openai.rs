//! OpenAI-compatible chat.completions client.
//!
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::ProviderClient;
use crate::error::ProviderError;
use crate::prompt::Prompt;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAiProvider {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  timeout_secs: u64,
}

impl OpenAiProvider {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(timeout_secs: u64) -> Option<Self> {
    Self::from_vars(&|k| std::env::var(k).ok(), timeout_secs)
  }

  /// Same as `from_env`, reading variables through `var`.
  pub fn from_vars(var: &dyn Fn(&str) -> Option<String>, timeout_secs: u64) -> Option<Self> {
    let api_key = var("OPENAI_API_KEY")?;
    let base_url = var("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
    let model = var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
    Self::new(api_key, base_url, model, timeout_secs)
  }

  pub fn new(api_key: String, base_url: String, model: String, timeout_secs: u64) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, timeout_secs })
  }
}

#[async_trait]
impl ProviderClient for OpenAiProvider {
  fn name(&self) -> &str { "openai" }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
  async fn call(&self, prompt: &Prompt) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompt.system.clone() },
        ChatMessageReq { role: "user".into(), content: prompt.user.clone() },
      ],
      temperature: 0.7,
      max_tokens: Some(4000),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "questgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| ProviderError::from_reqwest(e, self.timeout_secs))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| ProviderError::from_reqwest(e, self.timeout_secs))?;
    if !status.is_success() {
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(ProviderError::Http { status: status.as_u16(), message });
    }

    let text = parse_chat_envelope(&body)?;
    info!(target: "provider", model = %self.model, response_len = text.len(), "OpenAI completion received");
    Ok(text)
  }
}

/// Pull the first choice's content out of a chat.completions body.
pub fn parse_chat_envelope(body: &str) -> Result<String, ProviderError> {
  let parsed: ChatCompletionResponse =
    serde_json::from_str(body).map_err(|e| ProviderError::Envelope(format!("JSON parse error: {e}")))?;
  if let Some(usage) = &parsed.usage {
    info!(target: "provider", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
  }
  let text = parsed
    .choices
    .first()
    .and_then(|c| c.message.content.clone())
    .unwrap_or_default()
    .trim()
    .to_string();
  if text.is_empty() {
    return Err(ProviderError::Envelope("no content in first choice".into()));
  }
  Ok(text)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
