//! Per-item schema validation against the owning combination.
//!
//! Applied item by item: one bad item never rejects its siblings.
//! Items that drift from the combination (other topic, other difficulty) are
//! rejected, not corrected.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::domain::{AgeGroup, Combination, Difficulty, GeneratedQuestion, QUESTION_TYPE_MULTIPLE_CHOICE};
use crate::error::ValidationError;
use crate::parser::RawItem;

const REQUIRED: [&str; 6] = ["topic", "subtopic", "example_question", "options", "correct_answer", "difficulty"];

/// Validate one raw item. The returned question has an empty `question_id` and
/// `year_level == 0`; both are filled in by the id assigner.
pub fn validate(raw: &RawItem, combination: &Combination) -> Result<GeneratedQuestion, ValidationError> {
  let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

  for field in REQUIRED {
    match obj.get(field) {
      None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
      _ => {}
    }
  }

  let topic = scalar_text(obj, "topic")?;
  let subtopic = scalar_text(obj, "subtopic")?;
  let example_question = scalar_text(obj, "example_question")?;
  let correct_answer = scalar_text(obj, "correct_answer")?;
  let difficulty_raw = scalar_text(obj, "difficulty")?;
  let options = options(obj)?;

  if options.len() < 2 {
    return Err(ValidationError::TooFewOptions(options.len()));
  }
  let mut seen = HashSet::new();
  for o in &options {
    if !seen.insert(o.as_str()) {
      return Err(ValidationError::DuplicateOption(o.clone()));
    }
  }
  if !options.iter().any(|o| o == &correct_answer) {
    return Err(ValidationError::AnswerNotInOptions(correct_answer));
  }

  if topic != combination.topic {
    return Err(drift("topic", &combination.topic, topic));
  }
  if subtopic != combination.subtopic {
    return Err(drift("subtopic", &combination.subtopic, subtopic));
  }
  if Difficulty::parse(&difficulty_raw) != Some(combination.difficulty) {
    return Err(drift("difficulty", combination.difficulty.as_str(), difficulty_raw));
  }
  if let Some(age_raw) = optional_text(obj, "age_group") {
    if AgeGroup::parse(&age_raw) != Some(combination.age_group) {
      return Err(drift("age_group", combination.age_group.as_str(), age_raw));
    }
  }

  Ok(GeneratedQuestion {
    question_id: String::new(),
    topic,
    subtopic,
    example_question,
    question_type: QUESTION_TYPE_MULTIPLE_CHOICE.to_string(),
    options,
    correct_answer,
    difficulty: combination.difficulty,
    red_herring_tag: tags(obj),
    red_herring_explanation: optional_text(obj, "red_herring_explanation"),
    pedagogical_notes: optional_text(obj, "pedagogical_notes"),
    year_level: 0,
    age_group: combination.age_group,
  })
}

fn drift(field: &'static str, expected: &str, got: String) -> ValidationError {
  ValidationError::Drift { field, expected: expected.to_string(), got }
}

/// Strings are trimmed; numbers are accepted and stringified (answers like `42`).
fn as_text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn scalar_text(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
  let v = obj.get(field).ok_or(ValidationError::MissingField(field))?;
  let s = as_text(v).ok_or(ValidationError::WrongType(field))?;
  if s.is_empty() {
    return Err(ValidationError::MissingField(field));
  }
  Ok(s)
}

fn optional_text(obj: &Map<String, Value>, field: &str) -> Option<String> {
  obj.get(field).and_then(as_text).filter(|s| !s.is_empty())
}

fn options(obj: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
  let arr = obj
    .get("options")
    .and_then(Value::as_array)
    .ok_or(ValidationError::WrongType("options"))?;
  arr.iter()
    .map(|v| as_text(v).ok_or(ValidationError::WrongType("options")))
    .collect()
}

/// `red_herring_tag` may be a list of labels or a single label.
fn tags(obj: &Map<String, Value>) -> Option<Vec<String>> {
  let tags: Vec<String> = match obj.get("red_herring_tag")? {
    Value::Array(arr) => arr.iter().filter_map(as_text).filter(|s| !s.is_empty()).collect(),
    other => as_text(other).filter(|s| !s.is_empty()).into_iter().collect(),
  };
  if tags.is_empty() { None } else { Some(tags) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn combo() -> Combination {
    Combination {
      topic: "Algebra".into(),
      subtopic: "Linear Equations".into(),
      difficulty: Difficulty::Easy,
      age_group: AgeGroup::Year4To5,
    }
  }

  fn good() -> Value {
    json!({
      "topic": "Algebra",
      "subtopic": "Linear Equations",
      "example_question": "Solve x + 3 = 7",
      "question_type": "Multiple Choice",
      "options": ["4", "10", "3", "7"],
      "correct_answer": "4",
      "difficulty": "Easy",
      "red_herring_tag": ["AddInsteadOfSubtract"],
      "red_herring_explanation": "10 comes from adding 3 instead of subtracting.",
      "pedagogical_notes": "Year 4: inverse operations",
      "age_group": "year 4-5"
    })
  }

  #[test]
  fn well_formed_item_passes() {
    let q = validate(&good(), &combo()).expect("valid");
    assert_eq!(q.correct_answer, "4");
    assert_eq!(q.options.len(), 4);
    assert_eq!(q.red_herring_tag, Some(vec!["AddInsteadOfSubtract".to_string()]));
    assert_eq!(q.question_type, "Multiple Choice");
    assert_eq!(q.age_group, AgeGroup::Year4To5);
    assert!(q.question_id.is_empty());
  }

  #[test]
  fn answer_must_be_an_option() {
    let mut v = good();
    v["correct_answer"] = json!("5");
    assert_eq!(validate(&v, &combo()), Err(ValidationError::AnswerNotInOptions("5".into())));
  }

  #[test]
  fn missing_required_field_is_reported_by_name() {
    for field in REQUIRED {
      let mut v = good();
      v.as_object_mut().expect("object").remove(field);
      assert_eq!(validate(&v, &combo()), Err(ValidationError::MissingField(field)), "{field}");
    }
  }

  #[test]
  fn drifted_topic_or_difficulty_is_rejected() {
    let mut v = good();
    v["topic"] = json!("Geometry");
    assert!(matches!(validate(&v, &combo()), Err(ValidationError::Drift { field: "topic", .. })));

    let mut v = good();
    v["difficulty"] = json!("Hard");
    assert!(matches!(validate(&v, &combo()), Err(ValidationError::Drift { field: "difficulty", .. })));

    let mut v = good();
    v["age_group"] = json!("11+");
    assert!(matches!(validate(&v, &combo()), Err(ValidationError::Drift { field: "age_group", .. })));
  }

  #[test]
  fn options_must_be_distinct_and_plural() {
    let mut v = good();
    v["options"] = json!(["4", "4"]);
    assert_eq!(validate(&v, &combo()), Err(ValidationError::DuplicateOption("4".into())));

    let mut v = good();
    v["options"] = json!(["4"]);
    assert_eq!(validate(&v, &combo()), Err(ValidationError::TooFewOptions(1)));

    let mut v = good();
    v["options"] = json!("4, 10");
    assert_eq!(validate(&v, &combo()), Err(ValidationError::WrongType("options")));
  }

  #[test]
  fn numeric_values_and_single_tag_are_accepted() {
    let mut v = good();
    v["options"] = json!([4, 10, 3]);
    v["correct_answer"] = json!(4);
    v["red_herring_tag"] = json!("AddInsteadOfSubtract");
    v.as_object_mut().expect("object").remove("age_group");
    let q = validate(&v, &combo()).expect("valid");
    assert_eq!(q.options, vec!["4", "10", "3"]);
    assert_eq!(q.correct_answer, "4");
    assert_eq!(q.red_herring_tag, Some(vec!["AddInsteadOfSubtract".to_string()]));
  }

  #[test]
  fn non_object_items_are_rejected() {
    assert_eq!(validate(&json!("hello"), &combo()), Err(ValidationError::NotAnObject));
  }
}
