//! Curriculum question-generation pipeline.
//!
//! For every (topic, subtopic, difficulty, age group) combination in the catalog,
//! asks an LLM for multiple-choice questions, repairs and validates the output,
//! assigns curriculum-coded ids, persists the survivors, and streams progress.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod emitter;
pub mod error;
pub mod ids;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod protocol;
pub mod providers;
pub mod routes;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
pub mod validate;

pub use domain::{AgeGroup, Combination, Difficulty, GeneratedQuestion};
pub use emitter::ProgressEmitter;
pub use pipeline::{Orchestrator, RunSummary};
pub use protocol::ProgressEvent;
