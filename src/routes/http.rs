//! HTTP endpoint handlers. These are thin wrappers that forward to the pipeline.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::State,
  http::{header::CACHE_CONTROL, HeaderName, StatusCode},
  response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse, Response,
  },
  Json,
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::emitter::ProgressEmitter;
use crate::protocol::*;
use crate::state::AppState;

/// Bounded so a slow client applies backpressure to the run.
const EVENT_BUFFER: usize = 64;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, providers: state.chain.names(), store: state.store.kind() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_combinations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  match state.catalog.list().await {
    Ok(combinations) => {
      info!(target: "questgen", total = combinations.len(), "HTTP combinations listed");
      Json(CombinationsOut { total: combinations.len(), combinations }).into_response()
    }
    Err(e) => {
      error!(target: "questgen", error = %e, "HTTP combinations: catalog unavailable");
      (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
    }
  }
}

/// Start a generation run and stream its progress as server-sent events.
/// An empty body means defaults; a body that is not a valid `GenerateIn` is a 400.
/// The run stops issuing provider calls as soon as the client disconnects.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_generate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  let input = if body.iter().all(u8::is_ascii_whitespace) {
    GenerateIn::default()
  } else {
    match serde_json::from_slice::<GenerateIn>(&body) {
      Ok(b) => b,
      Err(e) => {
        warn!(target: "questgen", error = %e, "HTTP generate: rejecting malformed body");
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": format!("invalid request body: {e}") })))
          .into_response();
      }
    }
  };
  let requested = input.questions_per_combination;
  let count = state.questions_per_combination(requested);
  info!(target: "questgen", ?requested, count, "HTTP generation run requested");

  let (emitter, rx) = ProgressEmitter::channel(EVENT_BUFFER, CancellationToken::new());
  let orchestrator = state.orchestrator();
  tokio::spawn(async move {
    let summary = orchestrator.run(count, &emitter).await;
    info!(target: "questgen", ?summary, "Generation task finished");
  });

  let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
  (
    [
      (CACHE_CONTROL, "no-cache"),
      (HeaderName::from_static("x-accel-buffering"), "no"),
    ],
    Sse::new(stream).keep_alive(KeepAlive::default()),
  )
    .into_response()
}
