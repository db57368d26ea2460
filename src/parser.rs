//! Extraction of a JSON array from noisy model output.
//!
//! Models wrap output in Markdown fences, add commentary around it, and emit
//! near-JSON (single quotes, trailing commas). This module recovers the array
//! or fails the whole response with `MalformedResponse`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::MalformedResponse;
use crate::util::trunc_for_log;

/// One untyped candidate item. Expected to be a JSON object; the validator enforces it.
pub type RawItem = Value;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();
static TRAILING_COMMA_RE: OnceLock<Regex> = OnceLock::new();

fn fence_re() -> &'static Regex {
  FENCE_RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("static regex"))
}

fn trailing_comma_re() -> &'static Regex {
  TRAILING_COMMA_RE.get_or_init(|| Regex::new(r",\s*([\]}])").expect("static regex"))
}

pub fn strip_code_fences(raw: &str) -> String {
  fence_re().replace_all(raw, "").trim().to_string()
}

/// Slice from the first `[` to the last `]`. Text without such a span is returned as is.
pub fn slice_outer_array(text: &str) -> &str {
  match (text.find('['), text.rfind(']')) {
    (Some(start), Some(end)) if start < end => &text[start..=end],
    _ => text,
  }
}

/// Structural repairs only: embedded newlines and trailing commas. Quotes are left alone.
pub fn repair(text: &str) -> String {
  let flat = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
  trailing_comma_re().replace_all(&flat, "$1").into_owned()
}

/// Last resort for single-quoted near-JSON. Also rewrites apostrophes, so it runs after `repair` failed.
pub fn normalize_quotes(text: &str) -> String {
  text.replace('\'', "\"")
}

/// Parse raw model text into candidate items.
///
/// Escalates strict parse, then structural repairs, then quote normalization,
/// so apostrophes survive unless the text really is single-quoted.
pub fn parse(raw: &str) -> Result<Vec<RawItem>, MalformedResponse> {
  let stripped = strip_code_fences(raw);
  if stripped.is_empty() {
    return Err(MalformedResponse { reason: "empty response".into() });
  }
  let sliced = slice_outer_array(&stripped);

  let value = match serde_json::from_str::<Value>(sliced) {
    Ok(v) => v,
    Err(strict_err) => {
      debug!(target: "parser", error = %strict_err, "Strict parse failed; applying structural repairs");
      let repaired = repair(sliced);
      match serde_json::from_str::<Value>(&repaired) {
        Ok(v) => v,
        Err(repair_err) => {
          debug!(target: "parser", error = %repair_err, "Structural repairs not enough; normalizing quotes");
          serde_json::from_str::<Value>(&normalize_quotes(&repaired)).map_err(|e| MalformedResponse {
            reason: format!("{e} (text: {})", trunc_for_log(sliced, 120)),
          })?
        }
      }
    }
  };

  match value {
    Value::Array(items) => Ok(items),
    Value::Object(mut obj) => match obj.remove("questions") {
      Some(Value::Array(items)) => Ok(items),
      _ => Err(MalformedResponse { reason: "root is an object without a 'questions' array".into() }),
    },
    other => Err(MalformedResponse { reason: format!("root is not an array (got {})", type_name(&other)) }),
  }
}

fn type_name(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
