//! Prompt rendering for one combination.
//!
//! Pure: the same combination and count always render the same prompt.

use serde_json::json;

use crate::config::Prompts;
use crate::domain::{AgeGroup, Combination, QUESTION_TYPE_MULTIPLE_CHOICE};
use crate::util::fill_template;

/// A rendered prompt, split the way chat-style providers expect it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
  pub system: String,
  pub user: String,
}

#[derive(Clone, Debug, Default)]
pub struct PromptBuilder {
  prompts: Prompts,
}

/// Year-level progression guidance per age group.
pub fn progression(age_group: AgeGroup) -> &'static [(u8, &'static str)] {
  match age_group {
    AgeGroup::Year2To3 => &[
      (2, "numbers up to 100, simple addition and subtraction"),
      (3, "numbers up to 1,000, introduction to multiplication and division"),
    ],
    AgeGroup::Year4To5 => &[
      (4, "numbers up to 10,000, written methods"),
      (5, "complex calculations, real-world applications"),
    ],
    AgeGroup::ElevenPlus => &[
      (5, "multi-step reasoning, mixed operations"),
      (6, "exam-style problem solving, ratio and algebra readiness"),
    ],
  }
}

impl PromptBuilder {
  pub fn new(prompts: Prompts) -> Self { Self { prompts } }

  pub fn build(&self, combination: &Combination, count: usize) -> Prompt {
    let schema = schema_template(combination);
    let progression_text = progression(combination.age_group)
      .iter()
      .map(|(year, focus)| format!("- Year {year}: {focus}"))
      .collect::<Vec<_>>()
      .join("\n");
    let year_levels = combination
      .age_group
      .year_levels()
      .iter()
      .map(|y| format!("Year {y}"))
      .collect::<Vec<_>>()
      .join(" and ");
    let count = count.to_string();

    let pairs = [
      ("count", count.as_str()),
      ("topic", combination.topic.as_str()),
      ("subtopic", combination.subtopic.as_str()),
      ("difficulty", combination.difficulty.as_str()),
      ("age_group", combination.age_group.as_str()),
      ("year_levels", year_levels.as_str()),
      ("progression", progression_text.as_str()),
      ("schema", schema.as_str()),
    ];
    Prompt {
      system: fill_template(&self.prompts.system, &pairs),
      user: fill_template(&self.prompts.user_template, &pairs),
    }
  }
}

/// Template object showing the model exactly which fields to emit.
fn schema_template(c: &Combination) -> String {
  let first_year = c.age_group.year_levels()[0];
  let template = json!({
    "topic": c.topic,
    "subtopic": c.subtopic,
    "example_question": "<question stem>",
    "question_type": QUESTION_TYPE_MULTIPLE_CHOICE,
    "options": ["<option A>", "<option B>", "<option C>", "<option D>"],
    "correct_answer": "<exactly one of the options>",
    "difficulty": c.difficulty.as_str(),
    "red_herring_tag": ["<misconception label>"],
    "red_herring_explanation": "<why each wrong option is tempting>",
    "pedagogical_notes": format!("Year {first_year}: <what this question assesses>"),
    "age_group": c.age_group.as_str(),
  });
  serde_json::to_string_pretty(&template).unwrap_or_else(|_| template.to_string())
}
