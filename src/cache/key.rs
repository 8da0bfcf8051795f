//! Deterministic cache keys.
//!
//! A key has the form `<namespace>:<operation>:<canonical params>`, e.g.
//! `jira:issue:{"issue_key":"PROJ-1"}`. Invalidation matches on substrings of
//! these keys, so the params are kept readable rather than hashed.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::{Map, Value};

pub const NAMESPACE: &str = "jira";

/// Derive the cache key for a request.
///
/// Identical requests produce identical keys regardless of field order, and
/// absent optional fields key the same as fields explicitly set to null.
pub fn generate_key<P: Serialize + ?Sized>(
  namespace: &str,
  operation: &str,
  params: &P,
) -> Result<String> {
  let value = serde_json::to_value(params)
    .map_err(|e| eyre!("Failed to serialize cache key params for {}: {}", operation, e))?;

  let canonical = serde_json::to_string(&canonicalize(value))
    .map_err(|e| eyre!("Failed to encode cache key params for {}: {}", operation, e))?;

  Ok(format!("{}:{}:{}", namespace, operation, canonical))
}

/// Recursively sort object keys and drop null members. Arrays keep their order.
fn canonicalize(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(String, Value)> = map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, canonicalize(v)))
        .collect();
      entries.sort_by(|a, b| a.0.cmp(&b.0));

      let mut sorted = Map::new();
      for (k, v) in entries {
        sorted.insert(k, v);
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_key_ignores_field_order() {
    let a = generate_key(NAMESPACE, "search", &json!({"a": 1, "b": 2})).unwrap();
    let b = generate_key(NAMESPACE, "search", &json!({"b": 2, "a": 1})).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn test_key_discriminates_values() {
    let a = generate_key(NAMESPACE, "search", &json!({"a": 1})).unwrap();
    let b = generate_key(NAMESPACE, "search", &json!({"a": 2})).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn test_key_discriminates_arrays_and_nested_objects() {
    let base = json!({"fields": ["summary", "status"], "opts": {"x": 1}});
    let reordered = json!({"fields": ["status", "summary"], "opts": {"x": 1}});
    let nested = json!({"fields": ["summary", "status"], "opts": {"x": 2}});

    let k = |v: &Value| generate_key(NAMESPACE, "issue", v).unwrap();
    assert_ne!(k(&base), k(&reordered));
    assert_ne!(k(&base), k(&nested));
  }

  #[test]
  fn test_nested_objects_are_sorted() {
    let a = generate_key(NAMESPACE, "x", &json!({"o": {"z": 1, "y": [{"b": 1, "a": 2}]}})).unwrap();
    let b = generate_key(NAMESPACE, "x", &json!({"o": {"y": [{"a": 2, "b": 1}], "z": 1}})).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn test_absent_and_null_key_identically() {
    #[derive(Serialize)]
    struct Params {
      jql: String,
      fields: Option<Vec<String>>,
    }

    let explicit_none = generate_key(
      NAMESPACE,
      "search",
      &Params {
        jql: "project = PROJ".into(),
        fields: None,
      },
    )
    .unwrap();
    let omitted = generate_key(NAMESPACE, "search", &json!({"jql": "project = PROJ"})).unwrap();
    assert_eq!(explicit_none, omitted);
  }

  #[test]
  fn test_key_has_namespace_prefix_and_readable_ids() {
    let key = generate_key(NAMESPACE, "issue", &json!({"issue_key": "PROJ-7"})).unwrap();
    assert!(key.starts_with("jira:issue:"));
    assert!(key.contains("PROJ-7"));
  }

  #[test]
  fn test_operations_do_not_collide() {
    let a = generate_key(NAMESPACE, "issue", &json!({})).unwrap();
    let b = generate_key(NAMESPACE, "projects", &json!({})).unwrap();
    assert_ne!(a, b);
  }
}
