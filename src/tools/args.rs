//! Typed tool arguments.
//!
//! Parameters documented as "a string or an array of strings" go through
//! [`one_or_many`], so `"bug"` and `["bug"]` deserialize to the same value.

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ToolError;

/// Parse a tool's `arguments` object. Absent arguments are an empty object.
pub fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T> {
  let arguments = match arguments {
    Value::Null => Value::Object(Default::default()),
    other => other,
  };
  serde_json::from_value(arguments)
    .map_err(|e| ToolError::validation(format!("Invalid arguments: {}", e)).into())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

/// Coerce a string, an array of strings, or null into a list.
///
/// Entries are trimmed and blank ones dropped.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Option<OneOrMany> = Option::deserialize(deserializer)?;
  let list = match v {
    None => vec![],
    Some(OneOrMany::One(s)) => vec![s],
    Some(OneOrMany::Many(v)) => v,
  };
  Ok(normalize_string_list(list))
}

/// Like [`one_or_many`], but keeps "absent" distinct from "empty".
pub fn optional_one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Option<OneOrMany> = Option::deserialize(deserializer)?;
  Ok(v.map(|v| match v {
    OneOrMany::One(s) => normalize_string_list(vec![s]),
    OneOrMany::Many(v) => normalize_string_list(v),
  }))
}

pub fn normalize_string_list(list: Vec<String>) -> Vec<String> {
  list
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect()
}

#[derive(Debug, Deserialize)]
pub struct SearchIssuesArgs {
  #[serde(default)]
  pub jql: String,
  #[serde(default, deserialize_with = "one_or_many")]
  pub fields: Vec<String>,
  pub max_results: Option<u32>,
  pub start_at: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GetIssueArgs {
  #[serde(default)]
  pub issue_key: String,
  #[serde(default, deserialize_with = "one_or_many")]
  pub fields: Vec<String>,
  #[serde(default, deserialize_with = "one_or_many")]
  pub expand: Vec<String>,
}

/// Arguments of tools that only name an issue.
#[derive(Debug, Deserialize)]
pub struct IssueKeyArgs {
  #[serde(default)]
  pub issue_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectArgs {
  #[serde(default)]
  pub project_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ListBoardsArgs {
  pub project_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoardIssuesArgs {
  pub board_id: u64,
  pub jql: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetUserArgs {
  #[serde(default)]
  pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueArgs {
  pub project_key: Option<String>,
  pub summary: Option<String>,
  pub issue_type: Option<String>,
  pub description: Option<String>,
  #[serde(default, deserialize_with = "one_or_many")]
  pub labels: Vec<String>,
  #[serde(default, deserialize_with = "one_or_many")]
  pub components: Vec<String>,
  pub priority: Option<String>,
  pub assignee: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueArgs {
  #[serde(default)]
  pub issue_key: String,
  pub summary: Option<String>,
  pub description: Option<String>,
  #[serde(default, deserialize_with = "optional_one_or_many")]
  pub labels: Option<Vec<String>>,
  pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionIssueArgs {
  #[serde(default)]
  pub issue_key: String,
  #[serde(default)]
  pub transition_id: String,
  pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentArgs {
  #[serde(default)]
  pub issue_key: String,
  #[serde(default)]
  pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct AddWorklogArgs {
  #[serde(default)]
  pub issue_key: String,
  #[serde(default)]
  pub time_spent: String,
  pub comment: Option<String>,
  pub started: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignIssueArgs {
  #[serde(default)]
  pub issue_key: String,
  #[serde(default)]
  pub assignee: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionArgs {
  #[serde(default)]
  pub project_key: String,
  #[serde(default)]
  pub name: String,
  pub description: Option<String>,
  pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkIssuesArgs {
  #[serde(default)]
  pub link_type: String,
  #[serde(default)]
  pub inward_issue: String,
  #[serde(default)]
  pub outward_issue: String,
  pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveLinkArgs {
  #[serde(default)]
  pub link_id: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_scalar_and_array_labels_are_equal() {
    let scalar: CreateIssueArgs = parse(json!({ "labels": "bug" })).unwrap();
    let array: CreateIssueArgs = parse(json!({ "labels": ["bug"] })).unwrap();
    assert_eq!(scalar.labels, vec!["bug"]);
    assert_eq!(scalar.labels, array.labels);
  }

  #[test]
  fn test_absent_list_is_empty() {
    let args: GetIssueArgs = parse(json!({ "issue_key": "PROJ-1", "expand": null })).unwrap();
    assert!(args.fields.is_empty());
    assert!(args.expand.is_empty());
  }

  #[test]
  fn test_update_labels_keep_absence() {
    let untouched: UpdateIssueArgs = parse(json!({ "issue_key": "PROJ-1" })).unwrap();
    assert_eq!(untouched.labels, None);

    let cleared: UpdateIssueArgs = parse(json!({ "issue_key": "PROJ-1", "labels": [] })).unwrap();
    assert_eq!(cleared.labels, Some(vec![]));
  }

  #[test]
  fn test_blank_entries_are_dropped() {
    let args: GetIssueArgs = parse(json!({ "fields": [" summary ", "", "status"] })).unwrap();
    assert_eq!(args.fields, vec!["summary", "status"]);
  }

  #[test]
  fn test_null_arguments_are_an_empty_object() {
    let args: ListBoardsArgs = parse(Value::Null).unwrap();
    assert!(args.project_key.is_none());
  }

  #[test]
  fn test_wrong_type_is_validation() {
    let err = parse::<BoardIssuesArgs>(json!({ "board_id": "not a number" })).unwrap_err();
    assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::Validation(_))));
  }
}
