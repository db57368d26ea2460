//! Domain models used by the pipeline: combinations, difficulty/age bands, and generated questions.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const QUESTION_TYPE_MULTIPLE_CHOICE: &str = "Multiple Choice";

/// Difficulty band of a combination. Ordering is Easy < Medium < Hard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }

  /// Case-insensitive parse ("easy", "EASY" and "Easy" are the same band).
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Some(Difficulty::Easy),
      "medium" => Some(Difficulty::Medium),
      "hard" => Some(Difficulty::Hard),
      _ => None,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Age band. Each band spans a small set of school year levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
  #[serde(rename = "year 2-3")]
  Year2To3,
  #[serde(rename = "year 4-5")]
  Year4To5,
  #[serde(rename = "11+")]
  ElevenPlus,
}

impl AgeGroup {
  pub fn as_str(&self) -> &'static str {
    match self {
      AgeGroup::Year2To3 => "year 2-3",
      AgeGroup::Year4To5 => "year 4-5",
      AgeGroup::ElevenPlus => "11+",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "year 2-3" => Some(AgeGroup::Year2To3),
      "year 4-5" => Some(AgeGroup::Year4To5),
      "11+" => Some(AgeGroup::ElevenPlus),
      _ => None,
    }
  }

  /// Constituent year levels, lowest first.
  pub fn year_levels(&self) -> &'static [u8] {
    match self {
      AgeGroup::Year2To3 => &[2, 3],
      AgeGroup::Year4To5 => &[4, 5],
      AgeGroup::ElevenPlus => &[5, 6],
    }
  }
}

impl fmt::Display for AgeGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One generation unit. Field order defines the catalog ordering
/// (topic, then subtopic, then difficulty, then age group).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Combination {
  pub topic: String,
  pub subtopic: String,
  pub difficulty: Difficulty,
  pub age_group: AgeGroup,
}

impl fmt::Display for Combination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} / {} / {} / {}", self.topic, self.subtopic, self.difficulty, self.age_group)
  }
}

/// A validated multiple-choice question, as stored (one row per `question_id`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
  pub question_id: String,
  pub topic: String,
  pub subtopic: String,
  pub example_question: String,
  pub question_type: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  pub difficulty: Difficulty,
  #[serde(default)] pub red_herring_tag: Option<Vec<String>>,
  #[serde(default)] pub red_herring_explanation: Option<String>,
  #[serde(default)] pub pedagogical_notes: Option<String>,
  pub year_level: u8,
  pub age_group: AgeGroup,
}
