//! Application state: catalog, provider chain, question store, prompts, and pipeline settings.
//!
//! This module owns:
//!   - the combination catalog (TOML entries or the store's curriculum table)
//!   - the provider fallback chain (built from whichever API keys are present)
//!   - the question store (Supabase when configured, in-memory otherwise)
//!
//! Each generation request gets a fresh `Orchestrator` over these shared parts.

use std::{sync::Arc, time::Duration};

use tracing::{info, instrument, warn};

use crate::catalog::{CombinationCatalog, RestCatalog, TomlCatalog};
use crate::config::{CatalogSource, GeneratorConfig, PipelineSettings};
use crate::pipeline::Orchestrator;
use crate::prompt::PromptBuilder;
use crate::providers::ProviderFallbackChain;
use crate::store::{MemoryStore, QuestionStore, SupabaseRest, SupabaseStore};

#[derive(Clone)]
pub struct AppState {
  pub catalog: Arc<dyn CombinationCatalog>,
  pub chain: ProviderFallbackChain,
  pub store: Arc<dyn QuestionStore>,
  pub prompts: PromptBuilder,
  pub settings: PipelineSettings,
}

impl AppState {
  pub fn new(
    catalog: Arc<dyn CombinationCatalog>,
    chain: ProviderFallbackChain,
    store: Arc<dyn QuestionStore>,
    prompts: PromptBuilder,
    settings: PipelineSettings,
  ) -> Self {
    Self { catalog, chain, store, prompts, settings }
  }

  /// Build state from config + env: catalog source, provider chain, question store.
  #[instrument(level = "info", skip_all)]
  pub fn from_config(cfg: GeneratorConfig) -> Self {
    let rest = SupabaseRest::from_env();

    let store: Arc<dyn QuestionStore> = match &rest {
      Some(r) => Arc::new(SupabaseStore::new(r.clone(), cfg.store.questions_table.clone())),
      None => {
        warn!(target: "questgen", "SUPABASE_URL/SUPABASE_SERVICE_KEY not set; questions are kept in memory only");
        Arc::new(MemoryStore::new())
      }
    };

    let catalog: Arc<dyn CombinationCatalog> = match (cfg.pipeline.catalog, &rest) {
      (CatalogSource::Store, Some(r)) => {
        info!(target: "questgen", table = %cfg.store.catalog_table, "Catalog source: question store");
        Arc::new(RestCatalog::new(r.clone(), cfg.store.catalog_table.clone()))
      }
      (CatalogSource::Store, None) => {
        warn!(target: "questgen", "Catalog source 'store' needs Supabase credentials; falling back to TOML combinations");
        Arc::new(TomlCatalog::new(cfg.combinations.clone()))
      }
      (CatalogSource::Toml, _) => {
        info!(target: "questgen", entries = cfg.combinations.len(), "Catalog source: TOML");
        Arc::new(TomlCatalog::new(cfg.combinations.clone()))
      }
    };

    let chain = ProviderFallbackChain::from_env(&cfg.pipeline);
    if chain.is_empty() {
      warn!(target: "questgen", "No LLM provider configured (OPENAI_API_KEY / GEMINI_API_KEY); every combination will fail");
    }

    Self::new(catalog, chain, store, PromptBuilder::new(cfg.prompts), cfg.pipeline)
  }

  /// Fresh orchestrator per run; shares catalog, chain and store.
  pub fn orchestrator(&self) -> Orchestrator {
    Orchestrator::new(
      self.catalog.clone(),
      self.prompts.clone(),
      self.chain.clone(),
      self.store.clone(),
      Duration::from_millis(self.settings.inter_combination_delay_ms),
    )
  }

  /// Requested count, defaulted and clamped to `1..=max_questions_per_combination`.
  pub fn questions_per_combination(&self, requested: Option<i64>) -> usize {
    let max = self.settings.max_questions_per_combination.max(1);
    let Some(n) = requested else {
      return self.settings.default_questions_per_combination.clamp(1, max);
    };
    let count = if n < 1 { 1 } else { usize::try_from(n).unwrap_or(max).min(max) };
    if i64::try_from(count).ok() != Some(n) {
      warn!(target: "questgen", requested = n, count, max, "questionsPerCombination out of range; clamped");
    }
    count
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state() -> AppState {
    AppState::new(
      Arc::new(TomlCatalog::new(vec![])),
      ProviderFallbackChain::new(vec![], Duration::from_secs(1)),
      Arc::new(MemoryStore::new()),
      PromptBuilder::default(),
      PipelineSettings::default(),
    )
  }

  #[derive(Clone, Default)]
  struct LogBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

  impl std::io::Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().expect("log buffer").extend_from_slice(buf);
      Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
  }

  impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuf {
    type Writer = LogBuf;
    fn make_writer(&'a self) -> Self::Writer { self.clone() }
  }

  fn logged_while(f: impl FnOnce()) -> String {
    let buf = LogBuf::default();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(buf.clone())
      .with_ansi(false)
      .with_max_level(tracing::Level::WARN)
      .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.0.lock().expect("log buffer").clone();
    String::from_utf8_lossy(&bytes).into_owned()
  }

  #[test]
  fn clamping_is_logged_but_in_range_requests_are_not() {
    let s = state();
    let logs = logged_while(|| {
      assert_eq!(s.questions_per_combination(Some(0)), 1);
    });
    assert!(logs.contains("clamped") && logs.contains("requested=0"), "{logs}");

    let logs = logged_while(|| {
      assert_eq!(s.questions_per_combination(Some(500)), 20);
    });
    assert!(logs.contains("requested=500"), "{logs}");

    let logs = logged_while(|| {
      assert_eq!(s.questions_per_combination(Some(7)), 7);
      assert_eq!(s.questions_per_combination(None), 5);
    });
    assert!(logs.is_empty(), "{logs}");
  }

  #[test]
  fn count_defaults_to_five_and_is_clamped() {
    let s = state();
    assert_eq!(s.questions_per_combination(None), 5);
    assert_eq!(s.questions_per_combination(Some(3)), 3);
    assert_eq!(s.questions_per_combination(Some(0)), 1);
    assert_eq!(s.questions_per_combination(Some(-4)), 1);
    assert_eq!(s.questions_per_combination(Some(500)), 20);
  }
}
