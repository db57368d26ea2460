//! Question identifiers and year-level attribution.
//!
//! Format: `Y{year}{TOPIC_CODE}{timestamp6}{rand3}`, e.g. `Y4NPV48213107`.
//! The suffix makes collisions unlikely, not impossible; the store's uniqueness
//! constraint is the final arbiter and a conflict triggers `regenerate`.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::domain::{AgeGroup, Combination, GeneratedQuestion};

/// Topic keywords (lowercase, matched as substrings) to topic codes. First match wins.
const TOPIC_CODES: &[(&[&str], &str)] = &[
  (&["place value"], "NPV"),
  (&["addition", "subtraction"], "AS"),
  (&["multiplication", "division", "times table"], "MD"),
  (&["fraction"], "FR"),
  (&["decimal"], "DEC"),
  (&["percentage", "percent"], "PCT"),
  (&["ratio", "proportion"], "RAT"),
  (&["algebra", "equation", "sequence"], "ALG"),
  (&["geometry", "shape", "angle"], "GS"),
  (&["position", "direction", "coordinate"], "PD"),
  (&["measurement", "length", "mass", "volume", "area", "perimeter"], "MEA"),
  (&["time"], "TIM"),
  (&["money"], "MON"),
  (&["statistic", "data", "graph", "chart"], "STA"),
];

/// Codes that only exist in the 11+ band.
const ELEVEN_PLUS_CODES: &[(&[&str], &str)] = &[
  (&["non-verbal reasoning", "non verbal reasoning"], "NVR"),
  (&["verbal reasoning"], "VR"),
];

const FALLBACK_CODE: &str = "GEN";
const SUFFIX_LEN: usize = 9;

static YEAR_RE: OnceLock<Regex> = OnceLock::new();

fn year_re() -> &'static Regex {
  YEAR_RE.get_or_init(|| Regex::new(r"(?i)^\s*year\s*(\d{1,2})\b").expect("static regex"))
}

pub fn topic_code(topic: &str, age_group: AgeGroup) -> &'static str {
  let t = topic.to_lowercase();
  let lookup = |table: &[(&[&str], &'static str)]| {
    table
      .iter()
      .find(|(keys, _)| keys.iter().any(|k| t.contains(k)))
      .map(|(_, code)| *code)
  };
  if age_group == AgeGroup::ElevenPlus {
    if let Some(code) = lookup(ELEVEN_PLUS_CODES) {
      return code;
    }
  }
  lookup(TOPIC_CODES).unwrap_or(FALLBACK_CODE)
}

/// Year level from a leading "Year N" in the notes, if N belongs to the age group.
/// Otherwise alternate across the group's years by position in the batch.
pub fn year_level(notes: Option<&str>, age_group: AgeGroup, position: usize) -> u8 {
  let years = age_group.year_levels();
  let parsed = notes
    .and_then(|n| year_re().captures(n))
    .and_then(|c| c.get(1))
    .and_then(|m| m.as_str().parse::<u8>().ok())
    .filter(|y| years.contains(y));
  parsed.unwrap_or(years[position % years.len()])
}

/// Compose an id from its parts. `rand3` is taken modulo 1000.
pub fn compose(year: u8, code: &str, now_millis: i64, rand3: u16) -> String {
  format!("Y{year}{code}{:06}{:03}", now_millis.rem_euclid(1_000_000), rand3 % 1000)
}

fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// Fill in `year_level` and `question_id` for a validated question.
pub fn assign(question: &mut GeneratedQuestion, combination: &Combination, position: usize) -> String {
  let year = year_level(question.pedagogical_notes.as_deref(), combination.age_group, position);
  let code = topic_code(&combination.topic, combination.age_group);
  let id = compose(year, code, now_millis(), rand::thread_rng().gen_range(0..1000));
  question.year_level = year;
  question.question_id = id.clone();
  id
}

/// Replace the timestamp+random suffix, keeping the year/topic prefix.
/// The new id always differs from the old one.
pub fn regenerate(question: &mut GeneratedQuestion) -> String {
  let old = question.question_id.clone();
  let prefix_len = old.len().saturating_sub(SUFFIX_LEN);
  let prefix = &old[..prefix_len];
  let mut rand3: u16 = rand::thread_rng().gen_range(0..1000);
  let ts = now_millis();
  let mut id = format!("{prefix}{:06}{:03}", ts.rem_euclid(1_000_000), rand3);
  if id == old {
    rand3 = (rand3 + 1) % 1000;
    id = format!("{prefix}{:06}{:03}", ts.rem_euclid(1_000_000), rand3);
  }
  question.question_id = id.clone();
  id
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Difficulty, QUESTION_TYPE_MULTIPLE_CHOICE};

  fn combo(topic: &str, age_group: AgeGroup) -> Combination {
    Combination { topic: topic.into(), subtopic: "Any".into(), difficulty: Difficulty::Easy, age_group }
  }

  fn question(notes: Option<&str>) -> GeneratedQuestion {
    GeneratedQuestion {
      question_id: String::new(),
      topic: "Number - Place Value".into(),
      subtopic: "Any".into(),
      example_question: "Which digit is in the hundreds place of 4,381?".into(),
      question_type: QUESTION_TYPE_MULTIPLE_CHOICE.into(),
      options: vec!["3".into(), "4".into()],
      correct_answer: "3".into(),
      difficulty: Difficulty::Easy,
      red_herring_tag: None,
      red_herring_explanation: None,
      pedagogical_notes: notes.map(str::to_string),
      year_level: 0,
      age_group: AgeGroup::Year4To5,
    }
  }

  #[test]
  fn compose_matches_documented_shape() {
    assert_eq!(compose(4, "NPV", 1_700_000_482_131, 7), "Y4NPV482131007");
    assert_eq!(compose(2, "FR", 5, 1999), "Y2FR000005999");
  }

  #[test]
  fn topic_codes_follow_the_table() {
    assert_eq!(topic_code("Number - Place Value", AgeGroup::Year4To5), "NPV");
    assert_eq!(topic_code("Fractions", AgeGroup::Year2To3), "FR");
    assert_eq!(topic_code("Geometry - Properties of Shapes", AgeGroup::Year4To5), "GS");
    assert_eq!(topic_code("Algebra", AgeGroup::Year4To5), "ALG");
    assert_eq!(topic_code("Verbal Reasoning", AgeGroup::ElevenPlus), "VR");
    assert_eq!(topic_code("Non-Verbal Reasoning", AgeGroup::ElevenPlus), "NVR");
    assert_eq!(topic_code("Verbal Reasoning", AgeGroup::Year4To5), "GEN");
    assert_eq!(topic_code("Underwater Basket Weaving", AgeGroup::Year2To3), "GEN");
  }

  #[test]
  fn year_comes_from_notes_when_in_band() {
    assert_eq!(year_level(Some("Year 5: real-world problems"), AgeGroup::Year4To5, 0), 5);
    assert_eq!(year_level(Some("  year4 - written methods"), AgeGroup::Year4To5, 1), 4);
  }

  #[test]
  fn year_alternates_when_notes_absent_or_out_of_band() {
    assert_eq!(year_level(None, AgeGroup::Year4To5, 0), 4);
    assert_eq!(year_level(None, AgeGroup::Year4To5, 1), 5);
    assert_eq!(year_level(None, AgeGroup::Year4To5, 2), 4);
    assert_eq!(year_level(Some("Year 9: way off"), AgeGroup::Year2To3, 1), 3);
    assert_eq!(year_level(Some("Covers Year 5 content"), AgeGroup::ElevenPlus, 0), 5);
  }

  #[test]
  fn assign_sets_year_and_id() {
    let mut q = question(Some("Year 5: rounding"));
    let id = assign(&mut q, &combo("Number - Place Value", AgeGroup::Year4To5), 0);
    assert_eq!(q.year_level, 5);
    assert_eq!(q.question_id, id);
    assert!(id.starts_with("Y5NPV"), "{id}");
    assert_eq!(id.len(), "Y5NPV".len() + SUFFIX_LEN);
    assert!(id["Y5NPV".len()..].chars().all(|c| c.is_ascii_digit()));
  }

  #[test]
  fn regenerate_keeps_prefix_and_changes_id() {
    let mut q = question(None);
    let first = assign(&mut q, &combo("Fractions", AgeGroup::Year4To5), 1);
    for _ in 0..50 {
      let prev = q.question_id.clone();
      let next = regenerate(&mut q);
      assert_ne!(next, prev);
      assert!(next.starts_with("Y5FR"), "{next}");
      assert_eq!(next.len(), first.len());
    }
  }
}
