//! Public protocol structs for the HTTP endpoints and the progress stream (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Combination, GeneratedQuestion};

/// Progress events streamed to the caller, one SSE `data:` line each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
  Start {
    #[serde(rename = "totalCombinations")]
    total_combinations: usize,
    #[serde(rename = "questionsPerCombination")]
    questions_per_combination: usize,
  },
  Progress {
    current: usize,
    total: usize,
    #[serde(rename = "currentCombination")]
    current_combination: Combination,
  },
  Question {
    data: GeneratedQuestion,
    index: usize,
    total: usize,
  },
  Saved {
    #[serde(rename = "questionId")]
    question_id: String,
    index: usize,
  },
  CombinationComplete {
    combination: Combination,
    generated: usize,
    #[serde(rename = "apiUsed")]
    api_used: String,
  },
  CombinationError {
    combination: Combination,
    error: String,
  },
  Complete {
    #[serde(rename = "totalCombinations")]
    total_combinations: usize,
    successful: usize,
    failed: usize,
    #[serde(rename = "totalGenerated")]
    total_generated: usize,
  },
  /// Catalog-level failure only; terminates the stream.
  Error {
    message: String,
  },
}

impl ProgressEvent {
  /// Wire tag, handy for logs and assertions.
  pub fn kind(&self) -> &'static str {
    match self {
      ProgressEvent::Start { .. } => "start",
      ProgressEvent::Progress { .. } => "progress",
      ProgressEvent::Question { .. } => "question",
      ProgressEvent::Saved { .. } => "saved",
      ProgressEvent::CombinationComplete { .. } => "combination_complete",
      ProgressEvent::CombinationError { .. } => "combination_error",
      ProgressEvent::Complete { .. } => "complete",
      ProgressEvent::Error { .. } => "error",
    }
  }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
  #[serde(rename = "questionsPerCombination", default)]
  pub questions_per_combination: Option<i64>,
}

#[derive(Serialize)]
pub struct CombinationsOut {
  pub total: usize,
  pub combinations: Vec<Combination>,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub providers: Vec<String>,
  pub store: &'static str,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AgeGroup, Difficulty};
  use serde_json::json;

  fn combo() -> Combination {
    Combination {
      topic: "Algebra".into(),
      subtopic: "Linear Equations".into(),
      difficulty: Difficulty::Easy,
      age_group: AgeGroup::Year4To5,
    }
  }

  #[test]
  fn events_use_type_tag_and_camel_case_fields() {
    let ev = ProgressEvent::Start { total_combinations: 3, questions_per_combination: 5 };
    assert_eq!(
      serde_json::to_value(&ev).expect("serialize"),
      json!({"type": "start", "totalCombinations": 3, "questionsPerCombination": 5})
    );

    let ev = ProgressEvent::CombinationComplete { combination: combo(), generated: 2, api_used: "openai".into() };
    assert_eq!(
      serde_json::to_value(&ev).expect("serialize"),
      json!({
        "type": "combination_complete",
        "combination": {"topic": "Algebra", "subtopic": "Linear Equations", "difficulty": "Easy", "age_group": "year 4-5"},
        "generated": 2,
        "apiUsed": "openai"
      })
    );

    let ev = ProgressEvent::Complete { total_combinations: 1, successful: 1, failed: 0, total_generated: 3 };
    let v = serde_json::to_value(&ev).expect("serialize");
    assert_eq!(v["type"], "complete");
    assert_eq!(v["totalGenerated"], 3);
  }

  #[test]
  fn progress_carries_current_combination() {
    let ev = ProgressEvent::Progress { current: 1, total: 4, current_combination: combo() };
    let v = serde_json::to_value(&ev).expect("serialize");
    assert_eq!(v["currentCombination"]["age_group"], "year 4-5");
    assert_eq!(ev.kind(), "progress");
  }

  #[test]
  fn generate_body_field_is_optional() {
    let b: GenerateIn = serde_json::from_str("{}").expect("parse");
    assert_eq!(b.questions_per_combination, None);
    let b: GenerateIn = serde_json::from_str(r#"{"questionsPerCombination": 3}"#).expect("parse");
    assert_eq!(b.questions_per_combination, Some(3));
  }
}
