//! In-memory question store, used when no database credentials are configured.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::QuestionStore;
use crate::domain::GeneratedQuestion;
use crate::error::PersistError;

#[derive(Clone, Default)]
pub struct MemoryStore {
  by_id: Arc<RwLock<HashMap<String, GeneratedQuestion>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  pub async fn len(&self) -> usize { self.by_id.read().await.len() }

  pub async fn get(&self, id: &str) -> Option<GeneratedQuestion> {
    self.by_id.read().await.get(id).cloned()
  }

  pub async fn all(&self) -> Vec<GeneratedQuestion> {
    let mut v: Vec<_> = self.by_id.read().await.values().cloned().collect();
    v.sort_by(|a, b| a.question_id.cmp(&b.question_id));
    v
  }
}

#[async_trait]
impl QuestionStore for MemoryStore {
  #[instrument(level = "debug", skip(self, question), fields(id = %question.question_id))]
  async fn save(&self, question: &GeneratedQuestion) -> Result<(), PersistError> {
    let mut by_id = self.by_id.write().await;
    if by_id.contains_key(&question.question_id) {
      return Err(PersistError::DuplicateKey(question.question_id.clone()));
    }
    by_id.insert(question.question_id.clone(), question.clone());
    debug!(target: "store", total = by_id.len(), "Question stored in memory");
    Ok(())
  }

  fn kind(&self) -> &'static str { "memory" }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AgeGroup, Difficulty, QUESTION_TYPE_MULTIPLE_CHOICE};

  fn question(id: &str) -> GeneratedQuestion {
    GeneratedQuestion {
      question_id: id.into(),
      topic: "Fractions".into(),
      subtopic: "Halves".into(),
      example_question: "What is half of 8?".into(),
      question_type: QUESTION_TYPE_MULTIPLE_CHOICE.into(),
      options: vec!["4".into(), "2".into()],
      correct_answer: "4".into(),
      difficulty: Difficulty::Easy,
      red_herring_tag: None,
      red_herring_explanation: None,
      pedagogical_notes: None,
      year_level: 2,
      age_group: AgeGroup::Year2To3,
    }
  }

  #[tokio::test]
  async fn second_insert_with_same_id_is_rejected() {
    let store = MemoryStore::new();
    store.save(&question("Y2FR123456001")).await.expect("first insert");
    let err = store.save(&question("Y2FR123456001")).await.expect_err("duplicate");
    assert!(matches!(err, PersistError::DuplicateKey(id) if id == "Y2FR123456001"));
    assert_eq!(store.len().await, 1);
  }
}
