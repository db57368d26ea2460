//! Question store: the only shared mutable resource of the pipeline.
//!
//! The pipeline only ever appends. Uniqueness of `question_id` is enforced by the
//! store itself and surfaces as `PersistError::DuplicateKey`.

use async_trait::async_trait;

use crate::domain::GeneratedQuestion;
use crate::error::PersistError;

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::{SupabaseRest, SupabaseStore};

#[async_trait]
pub trait QuestionStore: Send + Sync {
  /// Insert one question. Never overwrites an existing row.
  async fn save(&self, question: &GeneratedQuestion) -> Result<(), PersistError>;

  /// Short label for logs ("memory", "supabase").
  fn kind(&self) -> &'static str;
}
