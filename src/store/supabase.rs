//! Supabase (PostgREST) access: catalog selects and question inserts.
//!
//! NOTE: the service key is sent as both `apikey` and bearer token and is never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::QuestionStore;
use crate::domain::GeneratedQuestion;
use crate::error::PersistError;
use crate::util::trunc_for_log;

/// Postgres unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Rows requested per page; PostgREST's default `max_rows`.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct SupabaseRest {
  client: reqwest::Client,
  pub base_url: String,
  service_key: String,
  page_size: usize,
}

impl SupabaseRest {
  /// Construct the client if SUPABASE_URL and SUPABASE_SERVICE_KEY are set; otherwise None.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("SUPABASE_URL").ok()?;
    let service_key = std::env::var("SUPABASE_SERVICE_KEY").ok()?;
    Self::new(base_url, service_key)
  }

  pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;
    Some(Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      service_key: service_key.into(),
      page_size: DEFAULT_PAGE_SIZE,
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{}", self.base_url, table)
  }

  fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    rb.header(USER_AGENT, "questgen-backend/0.1")
      .header("apikey", &self.service_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
  }

  /// `GET /rest/v1/{table}?select={columns}&order={order}`, paged with limit/offset.
  ///
  /// Paging stops on an empty page, not a short one: the server may cap pages
  /// below `page_size` (`max_rows`).
  #[instrument(level = "info", skip(self), fields(%table))]
  pub async fn select_all<T: DeserializeOwned>(&self, table: &str, columns: &str, order: &str) -> Result<Vec<T>, String> {
    let mut rows: Vec<T> = Vec::new();
    let limit = self.page_size.to_string();
    loop {
      let offset = rows.len().to_string();
      let res = self
        .authed(self.client.get(self.table_url(table)))
        .query(&[("select", columns), ("order", order), ("limit", limit.as_str()), ("offset", offset.as_str())])
        .send()
        .await
        .map_err(|e| e.to_string())?;

      if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(format!("Supabase HTTP {}: {}", status, trunc_for_log(&body, 300)));
      }
      let page = res.json::<Vec<T>>().await.map_err(|e| format!("Supabase JSON parse error: {e}"))?;
      debug!(target: "store", %offset, rows = page.len(), "Fetched page");
      if page.is_empty() {
        break;
      }
      rows.extend(page);
    }
    Ok(rows)
  }

  /// `POST /rest/v1/{table}` with a single row. Plain insert: an existing key is a conflict.
  #[instrument(level = "debug", skip(self, row), fields(%table))]
  pub async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<(), (u16, String)> {
    let res = self
      .authed(self.client.post(self.table_url(table)))
      .header(CONTENT_TYPE, "application/json")
      .header("Prefer", "return=minimal")
      .json(row)
      .send()
      .await
      .map_err(|e| (0, e.to_string()))?;

    if res.status().is_success() {
      return Ok(());
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err((status, body))
  }
}

#[derive(Deserialize)]
struct PostgrestError {
  #[serde(default)] code: Option<String>,
  #[serde(default)] message: Option<String>,
}

/// Map a failed insert onto the persist taxonomy.
/// HTTP 409 or a Postgres unique violation code means the id is already taken.
pub fn classify_insert_failure(status: u16, body: &str, question_id: &str) -> PersistError {
  let parsed = serde_json::from_str::<PostgrestError>(body).ok();
  let code = parsed.as_ref().and_then(|p| p.code.as_deref());
  if status == 409 || code == Some(PG_UNIQUE_VIOLATION) {
    return PersistError::DuplicateKey(question_id.to_string());
  }
  let msg = parsed
    .and_then(|p| p.message)
    .unwrap_or_else(|| trunc_for_log(body, 300));
  if status == 0 {
    PersistError::Database(format!("transport: {msg}"))
  } else {
    PersistError::Database(format!("HTTP {status}: {msg}"))
  }
}

pub struct SupabaseStore {
  rest: SupabaseRest,
  table: String,
}

impl SupabaseStore {
  pub fn new(rest: SupabaseRest, table: impl Into<String>) -> Self {
    let table = table.into();
    info!(target: "store", base_url = %rest.base_url, %table, "Supabase question store enabled.");
    Self { rest, table }
  }
}

#[async_trait]
impl QuestionStore for SupabaseStore {
  #[instrument(level = "debug", skip(self, question), fields(id = %question.question_id))]
  async fn save(&self, question: &GeneratedQuestion) -> Result<(), PersistError> {
    match self.rest.insert(&self.table, question).await {
      Ok(()) => Ok(()),
      Err((status, body)) => {
        let err = classify_insert_failure(status, &body, &question.question_id);
        match &err {
          PersistError::DuplicateKey(id) => warn!(target: "store", %id, "Insert rejected: question_id already exists"),
          PersistError::Database(msg) => error!(target: "store", id = %question.question_id, error = %msg, "Insert failed"),
        }
        Err(err)
      }
    }
  }

  fn kind(&self) -> &'static str { "supabase" }
}
