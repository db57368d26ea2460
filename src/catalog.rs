//! Combination catalog: the set of (topic, subtopic, difficulty, age_group) tuples a run generates for.
//!
//! Whatever the backing source, `list()` returns a deduplicated, deterministically
//! ordered sequence so that re-runs are reproducible.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::config::CombinationCfg;
use crate::domain::{AgeGroup, Combination, Difficulty};
use crate::error::CatalogError;
use crate::store::supabase::SupabaseRest;

#[async_trait]
pub trait CombinationCatalog: Send + Sync {
  async fn list(&self) -> Result<Vec<Combination>, CatalogError>;
}

/// Sort by (topic, subtopic, difficulty, age_group) and drop repeated tuples.
pub fn normalize(mut combos: Vec<Combination>) -> Vec<Combination> {
  combos.sort();
  combos.dedup();
  combos
}

fn to_combination(topic: &str, subtopic: &str, difficulty: &str, age_group: &str) -> Option<Combination> {
  let topic = topic.trim();
  let subtopic = subtopic.trim();
  if topic.is_empty() || subtopic.is_empty() {
    return None;
  }
  Some(Combination {
    topic: topic.to_string(),
    subtopic: subtopic.to_string(),
    difficulty: Difficulty::parse(difficulty)?,
    age_group: AgeGroup::parse(age_group)?,
  })
}

/// Catalog declared as `[[combinations]]` in the generator TOML.
pub struct TomlCatalog {
  entries: Vec<CombinationCfg>,
}

impl TomlCatalog {
  pub fn new(entries: Vec<CombinationCfg>) -> Self { Self { entries } }
}

#[async_trait]
impl CombinationCatalog for TomlCatalog {
  #[instrument(level = "info", skip(self), fields(entries = self.entries.len()))]
  async fn list(&self) -> Result<Vec<Combination>, CatalogError> {
    let mut out = Vec::with_capacity(self.entries.len());
    for e in &self.entries {
      match to_combination(&e.topic, &e.subtopic, &e.difficulty, &e.age_group) {
        Some(c) => out.push(c),
        None => {
          error!(target: "catalog", topic = %e.topic, subtopic = %e.subtopic, difficulty = %e.difficulty, age_group = %e.age_group, "Skipping catalog entry: empty name or unknown difficulty/age group");
        }
      }
    }
    let combos = normalize(out);
    info!(target: "catalog", combinations = combos.len(), "TOML catalog listed");
    Ok(combos)
  }
}

#[derive(Deserialize)]
struct CatalogRow {
  #[serde(default)] topic: Option<String>,
  #[serde(default)] subtopic: Option<String>,
  #[serde(default)] difficulty: Option<String>,
  #[serde(default)] age_group: Option<String>,
}

/// Stable server-side order so paging never skips or repeats rows.
const CATALOG_ORDER: &str = "topic,subtopic,difficulty,age_group";

/// Catalog derived from the curriculum table of the question store.
/// Every page of the table is read; duplicates collapse in `normalize`.
pub struct RestCatalog {
  rest: SupabaseRest,
  table: String,
}

impl RestCatalog {
  pub fn new(rest: SupabaseRest, table: impl Into<String>) -> Self {
    Self { rest, table: table.into() }
  }
}

#[async_trait]
impl CombinationCatalog for RestCatalog {
  #[instrument(level = "info", skip(self), fields(table = %self.table))]
  async fn list(&self) -> Result<Vec<Combination>, CatalogError> {
    let rows: Vec<CatalogRow> = self
      .rest
      .select_all(&self.table, "topic,subtopic,difficulty,age_group", CATALOG_ORDER)
      .await
      .map_err(CatalogError::Unavailable)?;

    let total = rows.len();
    let combos: Vec<Combination> = rows
      .into_iter()
      .filter_map(|r| {
        to_combination(
          r.topic.as_deref().unwrap_or_default(),
          r.subtopic.as_deref().unwrap_or_default(),
          r.difficulty.as_deref().unwrap_or_default(),
          r.age_group.as_deref().unwrap_or_default(),
        )
      })
      .collect();
    if combos.len() < total {
      warn!(target: "catalog", skipped = total - combos.len(), "Ignored catalog rows with missing or unknown values");
    }
    let combos = normalize(combos);
    info!(target: "catalog", rows = total, combinations = combos.len(), "Store catalog listed");
    Ok(combos)
  }
}
