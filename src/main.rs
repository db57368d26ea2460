//! Questgen · curriculum question-generation backend
//!
//! - Axum HTTP API; generation progress is streamed as server-sent events
//! - LLM providers (OpenAI-compatible, Gemini) tried in priority order
//! - Questions persisted to Supabase, or kept in memory when no database is configured
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   GENERATOR_CONFIG_PATH : path to TOML config (pipeline, store, prompts, combinations)
//!   OPENAI_API_KEY        : enables the OpenAI provider
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   GEMINI_API_KEY        : enables the Gemini provider
//!   GEMINI_MODEL          : default "gemini-1.5-flash"
//!   SUPABASE_URL          : question store base URL
//!   SUPABASE_SERVICE_KEY  : question store service key
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use questgen::routes::build_router;
use questgen::state::AppState;
use questgen::{config, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  telemetry::init_tracing();

  let cfg = config::load_from_env();
  let state = Arc::new(AppState::from_config(cfg));
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
  info!(target: "questgen", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;
  info!(target: "questgen", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "questgen", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "questgen", "Shutdown signal received");
}
