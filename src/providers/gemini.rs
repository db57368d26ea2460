//! Google Gemini `generateContent` client, used as the secondary provider by default.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::ProviderClient;
use crate::error::ProviderError;
use crate::prompt::Prompt;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct GeminiProvider {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  timeout_secs: u64,
}

impl GeminiProvider {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env(timeout_secs: u64) -> Option<Self> {
    Self::from_vars(&|k| std::env::var(k).ok(), timeout_secs)
  }

  pub fn from_vars(var: &dyn Fn(&str) -> Option<String>, timeout_secs: u64) -> Option<Self> {
    let api_key = var("GEMINI_API_KEY")?;
    let base_url = var("GEMINI_BASE_URL")
      .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into());
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
impl ProviderClient for GeminiProvider {
  fn name(&self) -> &str { "gemini" }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
  async fn call(&self, prompt: &Prompt) -> Result<String, ProviderError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: prompt.system.clone() }] },
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: prompt.user.clone() }] }],
      generation_config: GenerationConfig { temperature: 0.7, max_output_tokens: 4000 },
    };

    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "questgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await
      .map_err(|e| ProviderError::from_reqwest(e.without_url(), self.timeout_secs))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| ProviderError::from_reqwest(e.without_url(), self.timeout_secs))?;
    if !status.is_success() {
      return Err(ProviderError::Http { status: status.as_u16(), message: trunc_for_log(&body, 300) });
    }

    let text = parse_gemini_envelope(&body)?;
    info!(target: "provider", model = %self.model, response_len = text.len(), "Gemini completion received");
    Ok(text)
  }
}

/// Concatenate the text parts of the first candidate.
pub fn parse_gemini_envelope(body: &str) -> Result<String, ProviderError> {
  let parsed: GenerateResponse =
    serde_json::from_str(body).map_err(|e| ProviderError::Envelope(format!("JSON parse error: {e}")))?;
  let text: String = parsed
    .candidates
    .first()
    .and_then(|c| c.content.as_ref())
    .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<Vec<_>>().join(""))
    .unwrap_or_default();
  let text = text.trim().to_string();
  if text.is_empty() {
    return Err(ProviderError::Envelope("no text in first candidate".into()));
  }
  Ok(text)
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  system_instruction: Content,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig { temperature: f32, max_output_tokens: u32 }

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
}
#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)] parts: Vec<CandidatePart>,
}
#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)] text: Option<String>,
}
