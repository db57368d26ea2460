//! Loading generator configuration (pipeline tuning, store tables, prompts, catalog) from TOML.
//!
//! Every section is optional; a missing `GENERATOR_CONFIG_PATH` means "all defaults".
//! Credentials never live here: they are read from the environment by the
//! provider and store clients.

use serde::Deserialize;
use tracing::{error, info};

use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GeneratorConfig {
  #[serde(default)]
  pub pipeline: PipelineSettings,
  #[serde(default)]
  pub store: StoreSettings,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub combinations: Vec<CombinationCfg>,
}

/// Where the batch reads its combinations from.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
  /// `[[combinations]]` entries of this file.
  #[default]
  Toml,
  /// The catalog table of the question store (needs SUPABASE_URL).
  Store,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  pub default_questions_per_combination: usize,
  pub max_questions_per_combination: usize,
  /// Courtesy pause between combinations, not a correctness timeout.
  pub inter_combination_delay_ms: u64,
  pub provider_timeout_secs: u64,
  /// Provider names in priority order. Unknown names are ignored with a log line.
  pub provider_order: Vec<String>,
  pub catalog: CatalogSource,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      default_questions_per_combination: 5,
      max_questions_per_combination: 20,
      inter_combination_delay_ms: 500,
      provider_timeout_secs: 60,
      provider_order: vec!["openai".into(), "gemini".into()],
      catalog: CatalogSource::Toml,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
  pub questions_table: String,
  pub catalog_table: String,
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self {
      questions_table: "curriculum".into(),
      catalog_table: "curriculum".into(),
    }
  }
}

/// Catalog entry accepted in TOML. Values are validated when the catalog is listed.
#[derive(Clone, Debug, Deserialize)]
pub struct CombinationCfg {
  pub topic: String,
  pub subtopic: String,
  pub difficulty: String,
  pub age_group: String,
}

/// Prompts sent to the providers. Placeholders: {count}, {topic}, {subtopic},
/// {difficulty}, {age_group}, {year_levels}, {progression}, {schema}.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are an expert UK primary mathematics curriculum writer. You write multiple-choice questions whose wrong options encode real student misconceptions. Respond ONLY with a JSON array.".into(),
      user_template: concat!(
        "Generate {count} multiple-choice questions.\n\n",
        "Topic: {topic}\n",
        "Subtopic: {subtopic}\n",
        "Difficulty: {difficulty}\n",
        "Age group: {age_group}\n\n",
        "Year-level progression for this age group:\n{progression}\n\n",
        "Distribute the questions across {year_levels}. Start every pedagogical_notes value with the year level it targets, e.g. \"Year N: ...\".\n",
        "Copy topic, subtopic, difficulty and age_group exactly as given above.\n",
        "correct_answer must be exactly one of the options. Options must be distinct.\n",
        "Each wrong option should be a red herring; label the misconceptions in red_herring_tag and explain them in red_herring_explanation.\n\n",
        "Every item must follow this JSON schema:\n{schema}\n\n",
        "Return ONLY a JSON array of {count} such objects. No prose, no markdown."
      ).into(),
    }
  }
}

/// Read and parse a config file.
pub fn load_from_path(path: &str) -> Result<GeneratorConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
  toml::from_str::<GeneratorConfig>(&s).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

/// Load config from GENERATOR_CONFIG_PATH. Missing variable or unreadable file => defaults.
pub fn load_from_env() -> GeneratorConfig {
  let Ok(path) = std::env::var("GENERATOR_CONFIG_PATH") else {
    info!(target: "questgen", "GENERATOR_CONFIG_PATH not set; using built-in defaults");
    return GeneratorConfig::default();
  };
  match load_from_path(&path) {
    Ok(cfg) => {
      info!(target: "questgen", %path, combinations = cfg.combinations.len(), "Loaded generator config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "questgen", %path, error = %e, "Failed to load generator config; using defaults");
      GeneratorConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_yields_defaults() {
    let cfg: GeneratorConfig = toml::from_str("").expect("parse");
    assert_eq!(cfg.pipeline.default_questions_per_combination, 5);
    assert_eq!(cfg.pipeline.inter_combination_delay_ms, 500);
    assert_eq!(cfg.pipeline.catalog, CatalogSource::Toml);
    assert!(cfg.combinations.is_empty());
    assert!(cfg.prompts.user_template.contains("{schema}"));
  }

  #[test]
  fn sections_override_defaults_partially() {
    let src = r#"
      [pipeline]
      inter_combination_delay_ms = 0
      provider_order = ["gemini"]
      catalog = "store"

      [store]
      questions_table = "questions"

      [[combinations]]
      topic = "Algebra"
      subtopic = "Linear Equations"
      difficulty = "Easy"
      age_group = "year 4-5"
    "#;
    let cfg: GeneratorConfig = toml::from_str(src).expect("parse");
    assert_eq!(cfg.pipeline.inter_combination_delay_ms, 0);
    assert_eq!(cfg.pipeline.max_questions_per_combination, 20);
    assert_eq!(cfg.pipeline.provider_order, vec!["gemini".to_string()]);
    assert_eq!(cfg.pipeline.catalog, CatalogSource::Store);
    assert_eq!(cfg.store.questions_table, "questions");
    assert_eq!(cfg.store.catalog_table, "curriculum");
    assert_eq!(cfg.combinations.len(), 1);
    assert_eq!(cfg.combinations[0].age_group, "year 4-5");
  }

  #[test]
  fn missing_file_is_a_read_error() {
    let err = load_from_path("/definitely/not/here.toml").expect_err("should fail");
    assert!(matches!(err, ConfigError::Read { .. }));
  }
}
