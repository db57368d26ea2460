//! Orchestrator: drives the per-combination generation loop.
//!
//! Flow per combination:
//!   progress → prompt → provider fallback → parse → per item: validate → assign id
//!   → persist (one retry on duplicate key) → `question` + `saved`
//!   → `combination_complete` | `combination_error`
//!
//! Error scope never widens: item errors drop the item, combination errors
//! become `combination_error`, and only a catalog failure ends the run early.
//! Combinations run sequentially with a fixed courtesy delay in between.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::catalog::CombinationCatalog;
use crate::domain::{Combination, GeneratedQuestion};
use crate::emitter::{Cancelled, ProgressEmitter};
use crate::error::{GenerateError, PersistError};
use crate::ids;
use crate::parser;
use crate::prompt::PromptBuilder;
use crate::protocol::ProgressEvent;
use crate::providers::ProviderFallbackChain;
use crate::store::QuestionStore;
use crate::validate;

/// Aggregate counters of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
  pub total_combinations: usize,
  pub successful: usize,
  pub failed: usize,
  pub total_generated: usize,
  pub cancelled: bool,
}

enum Outcome {
  Succeeded { generated: usize, provider: String },
  Failed { error: String },
}

#[derive(Clone)]
pub struct Orchestrator {
  catalog: Arc<dyn CombinationCatalog>,
  prompts: PromptBuilder,
  chain: ProviderFallbackChain,
  store: Arc<dyn QuestionStore>,
  delay: Duration,
}

impl Orchestrator {
  pub fn new(
    catalog: Arc<dyn CombinationCatalog>,
    prompts: PromptBuilder,
    chain: ProviderFallbackChain,
    store: Arc<dyn QuestionStore>,
    delay: Duration,
  ) -> Self {
    Self { catalog, prompts, chain, store, delay }
  }

  /// Run the whole batch, reporting through `emitter`. Counters are local to the call.
  #[instrument(level = "info", skip(self, emitter), fields(run_id = %uuid::Uuid::new_v4(), store = self.store.kind()))]
  pub async fn run(&self, count: usize, emitter: &ProgressEmitter) -> RunSummary {
    let mut summary = RunSummary::default();

    let combos = match self.catalog.list().await {
      Ok(c) => c,
      Err(e) => {
        error!(target: "pipeline", error = %e, "Catalog unavailable; aborting run");
        let _ = emitter.emit(ProgressEvent::Error { message: e.to_string() }).await;
        return summary;
      }
    };
    summary.total_combinations = combos.len();
    info!(target: "pipeline", combinations = combos.len(), count, providers = ?self.chain.names(), "Generation run started");

    match self.drive(&combos, count, emitter, &mut summary).await {
      Ok(()) => {
        info!(target: "pipeline", successful = summary.successful, failed = summary.failed, total_generated = summary.total_generated, "Generation run complete");
      }
      Err(Cancelled) => {
        summary.cancelled = true;
        warn!(target: "pipeline", successful = summary.successful, failed = summary.failed, total_generated = summary.total_generated, "Generation run cancelled by client");
      }
    }
    summary
  }

  async fn drive(
    &self,
    combos: &[Combination],
    count: usize,
    emitter: &ProgressEmitter,
    summary: &mut RunSummary,
  ) -> Result<(), Cancelled> {
    let cancel = emitter.cancel_token().clone();
    let total = combos.len();
    let mut issued: HashSet<String> = HashSet::new();

    emitter.emit(ProgressEvent::Start { total_combinations: total, questions_per_combination: count }).await?;

    for (i, combo) in combos.iter().enumerate() {
      emitter.emit(ProgressEvent::Progress { current: i + 1, total, current_combination: combo.clone() }).await?;

      match self.process_combination(combo, count, emitter, &cancel, &mut issued).await? {
        Outcome::Succeeded { generated, provider } => {
          summary.successful += 1;
          summary.total_generated += generated;
          info!(target: "pipeline", combination = %combo, generated, %provider, "Combination complete");
          emitter.emit(ProgressEvent::CombinationComplete { combination: combo.clone(), generated, api_used: provider }).await?;
        }
        Outcome::Failed { error } => {
          summary.failed += 1;
          warn!(target: "pipeline", combination = %combo, %error, "Combination failed");
          emitter.emit(ProgressEvent::CombinationError { combination: combo.clone(), error }).await?;
        }
      }

      if i + 1 < total && !self.delay.is_zero() {
        tokio::select! {
          _ = tokio::time::sleep(self.delay) => {}
          _ = cancel.cancelled() => return Err(Cancelled),
        }
      }
    }

    emitter.emit(ProgressEvent::Complete {
      total_combinations: total,
      successful: summary.successful,
      failed: summary.failed,
      total_generated: summary.total_generated,
    }).await
  }

  #[instrument(level = "info", skip_all, fields(combination = %combo))]
  async fn process_combination(
    &self,
    combo: &Combination,
    count: usize,
    emitter: &ProgressEmitter,
    cancel: &CancellationToken,
    issued: &mut HashSet<String>,
  ) -> Result<Outcome, Cancelled> {
    let prompt = self.prompts.build(combo, count);

    let generated = match self.chain.generate(&prompt, cancel).await {
      Ok(g) => g,
      Err(GenerateError::Cancelled) => return Err(Cancelled),
      Err(e) => return Ok(Outcome::Failed { error: e.to_string() }),
    };

    let items = match parser::parse(&generated.text) {
      Ok(items) => items,
      Err(e) => {
        warn!(target: "pipeline", provider = %generated.provider, error = %e, "Unparseable provider response");
        return Ok(Outcome::Failed { error: e.to_string() });
      }
    };

    let total = items.len();
    let mut persisted = 0usize;
    for (j, raw) in items.iter().enumerate() {
      let mut question = match validate::validate(raw, combo) {
        Ok(q) => q,
        Err(e) => {
          warn!(target: "pipeline", item = j + 1, of = total, reason = %e, "Dropping invalid item");
          continue;
        }
      };

      ids::assign(&mut question, combo, j);
      while issued.contains(&question.question_id) {
        ids::regenerate(&mut question);
      }

      if self.save_with_retry(&mut question).await.is_err() {
        continue;
      }
      issued.insert(question.question_id.clone());
      persisted += 1;

      let question_id = question.question_id.clone();
      emitter.emit(ProgressEvent::Question { data: question, index: j + 1, total }).await?;
      emitter.emit(ProgressEvent::Saved { question_id, index: j + 1 }).await?;
    }

    if persisted == 0 {
      return Ok(Outcome::Failed {
        error: format!("no valid questions were persisted ({total} received from {})", generated.provider),
      });
    }
    Ok(Outcome::Succeeded { generated: persisted, provider: generated.provider })
  }

  /// Save once; on a duplicate key regenerate the id suffix and save exactly once more.
  async fn save_with_retry(&self, question: &mut GeneratedQuestion) -> Result<(), PersistError> {
    match self.store.save(question).await {
      Ok(()) => Ok(()),
      Err(PersistError::DuplicateKey(old)) => {
        let new_id = ids::regenerate(question);
        warn!(target: "store", %old, %new_id, "Duplicate question_id; retrying with a fresh id");
        self.store.save(question).await.map_err(|e| {
          error!(target: "store", id = %question.question_id, error = %e, "Save failed after id retry; dropping item");
          e
        })
      }
      Err(e) => {
        error!(target: "store", id = %question.question_id, error = %e, "Save failed; dropping item");
        Err(e)
      }
    }
  }
}
