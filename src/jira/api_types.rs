//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on what the tools return.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::types::{
  Board, Comment, CreatedIssue, Field, Issue, IssueLinkRef, IssueSummary, LinkType, Project,
  SearchResult, ServerInfo, Transition, User, Version, Worklog,
};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamed {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub id: String,
  pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
  pub account_id: Option<String>,
  pub name: Option<String>,
  #[serde(default)]
  pub display_name: String,
  pub email_address: Option<String>,
  #[serde(default = "default_true")]
  pub active: bool,
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Deserialize)]
pub struct ApiIssueRef {
  pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiLinkTypeRef {
  pub inward: String,
  pub outward: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIssueLink {
  pub id: String,
  #[serde(rename = "type")]
  pub link_type: ApiLinkTypeRef,
  pub inward_issue: Option<ApiIssueRef>,
  pub outward_issue: Option<ApiIssueRef>,
}

// ============================================================================
// Issues - used by search, board issues and issue detail endpoints
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiIssueFields {
  #[serde(default)]
  pub summary: String,
  pub status: Option<ApiStatus>,
  #[serde(rename = "issuetype")]
  pub issue_type: Option<ApiNamed>,
  pub assignee: Option<ApiUser>,
  pub reporter: Option<ApiUser>,
  pub priority: Option<ApiNamed>,
  #[serde(default)]
  pub labels: Vec<String>,
  #[serde(default)]
  pub components: Vec<ApiNamed>,
  #[serde(default)]
  pub created: String,
  #[serde(default)]
  pub updated: String,
  // Description is complex (can be string or ADF), handled separately
  pub description: Option<serde_json::Value>,
  #[serde(default, rename = "issuelinks")]
  pub issue_links: Vec<ApiIssueLink>,
  /// Custom and other unmodelled fields, by field id.
  #[serde(flatten)]
  pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
  /// Top-level siblings of `fields`, including whatever `expand` produced
  /// (`changelog`, `renderedFields`).
  #[serde(flatten)]
  pub expanded: BTreeMap<String, Value>,
}

/// Search and board issues endpoints share this paging envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIssuePage {
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
  #[serde(default)]
  pub start_at: u64,
  #[serde(default)]
  pub max_results: u64,
  #[serde(default)]
  pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiCreatedIssue {
  pub id: String,
  pub key: String,
}

// ============================================================================
// Transitions, comments, worklogs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTransition {
  pub id: String,
  pub name: String,
  pub to: ApiStatus,
}

#[derive(Debug, Deserialize)]
pub struct ApiTransitionsResponse {
  #[serde(default)]
  pub transitions: Vec<ApiTransition>,
}

#[derive(Debug, Deserialize)]
pub struct ApiComment {
  pub id: String,
  pub author: Option<ApiUser>,
  pub body: Option<serde_json::Value>,
  #[serde(default)]
  pub created: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiWorklog {
  pub id: String,
  pub author: Option<ApiUser>,
  #[serde(default)]
  pub time_spent: String,
  #[serde(default)]
  pub time_spent_seconds: u64,
  #[serde(default)]
  pub started: String,
}

// ============================================================================
// Projects, versions, boards
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiProject {
  pub id: String,
  pub key: String,
  pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersion {
  pub id: String,
  pub name: String,
  pub description: Option<String>,
  #[serde(default)]
  pub released: bool,
  pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiBoard {
  pub id: u64,
  pub name: String,
  #[serde(rename = "type", default)]
  pub board_type: String,
}

/// Agile endpoints page with `values` + `isLast`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiValuesPage<T> {
  #[serde(default = "Vec::new")]
  pub values: Vec<T>,
  #[serde(default)]
  pub is_last: bool,
}

// ============================================================================
// Reference data
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiField {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub custom: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiLinkType {
  pub id: String,
  pub name: String,
  pub inward: String,
  pub outward: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLinkTypesResponse {
  #[serde(default)]
  pub issue_link_types: Vec<ApiLinkType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerInfo {
  #[serde(default)]
  pub base_url: String,
  #[serde(default)]
  pub version: String,
  pub deployment_type: Option<String>,
  pub server_title: Option<String>,
}

/// Error body returned by Jira on 4xx/5xx.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
  #[serde(default)]
  pub error_messages: Vec<String>,
  #[serde(default)]
  pub errors: std::collections::BTreeMap<String, String>,
}

impl ApiErrorBody {
  /// Flatten into one line, or `None` when Jira sent nothing useful.
  pub fn summary(&self) -> Option<String> {
    let parts: Vec<String> = self
      .error_messages
      .iter()
      .cloned()
      .chain(self.errors.iter().map(|(field, msg)| format!("{}: {}", field, msg)))
      .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
  }
}

// ============================================================================
// Conversions to domain types
// ============================================================================

/// Fields `IssueSummary` models directly.
const SUMMARY_FIELDS: &[&str] = &["summary", "status", "issuetype", "assignee", "priority", "updated"];

impl ApiIssueFields {
  /// A requested field that `IssueSummary` does not model. Nulls are dropped.
  fn summary_extra(&self, name: &str) -> Option<Value> {
    if SUMMARY_FIELDS.contains(&name) {
      return None;
    }
    let value = match name {
      "labels" => json!(self.labels),
      "components" => json!(self.components.iter().map(|c| &c.name).collect::<Vec<_>>()),
      "reporter" => json!(self.reporter.as_ref()?.display_name),
      "created" => json!(self.created),
      "description" => json!(extract_text(self.description.as_ref()?)?),
      other => self.other.get(other)?.clone(),
    };
    (!value.is_null()).then_some(value)
  }
}

/// Keep the entries of `map` named in `requested`, minus nulls.
fn pick(map: &BTreeMap<String, Value>, requested: &[String]) -> BTreeMap<String, Value> {
  requested
    .iter()
    .filter_map(|name| {
      let value = map.get(name).filter(|v| !v.is_null())?;
      Some((name.clone(), value.clone()))
    })
    .collect()
}

impl ApiIssue {
  /// `requested` are the extra field ids the caller asked for; those the
  /// summary does not model end up in `extra`.
  pub fn into_summary(self, requested: &[String]) -> IssueSummary {
    let extra = requested
      .iter()
      .filter_map(|name| Some((name.clone(), self.fields.summary_extra(name)?)))
      .collect();
    let f = self.fields;
    IssueSummary {
      key: self.key,
      summary: f.summary,
      status: f.status.map(|s| s.name).unwrap_or_default(),
      issue_type: f.issue_type.map(|t| t.name).unwrap_or_default(),
      assignee: f.assignee.map(|u| u.display_name),
      priority: f.priority.map(|p| p.name),
      updated: f.updated,
      extra,
    }
  }

  /// `fields` and `expand` are the caller's request. Requested fields with
  /// no dedicated slot land in `extra`; requested expansions in `expanded`.
  pub fn into_full(self, fields: &[String], expand: &[String]) -> Issue {
    let extra = pick(&self.fields.other, fields);
    let expanded = pick(&self.expanded, expand);
    let f = self.fields;
    Issue {
      key: self.key,
      summary: f.summary,
      description: f.description.as_ref().and_then(extract_text),
      status: f.status.map(|s| s.name).unwrap_or_default(),
      issue_type: f.issue_type.map(|t| t.name).unwrap_or_default(),
      assignee: f.assignee.map(|u| u.display_name),
      reporter: f.reporter.map(|u| u.display_name),
      priority: f.priority.map(|p| p.name),
      labels: f.labels,
      components: f.components.into_iter().map(|c| c.name).collect(),
      created: f.created,
      updated: f.updated,
      links: f.issue_links.into_iter().filter_map(IssueLinkRef::from_api).collect(),
      extra,
      expanded,
    }
  }
}

impl IssueLinkRef {
  fn from_api(link: ApiIssueLink) -> Option<Self> {
    // The issue we are looking at is the missing side.
    let (relation, other) = match (link.outward_issue, link.inward_issue) {
      (Some(out), _) => (link.link_type.outward, out),
      (None, Some(inw)) => (link.link_type.inward, inw),
      (None, None) => return None,
    };
    Some(IssueLinkRef {
      id: link.id,
      relation,
      issue_key: other.key,
    })
  }
}

impl ApiIssuePage {
  pub fn into_result(self, requested: &[String]) -> SearchResult {
    SearchResult {
      issues: self
        .issues
        .into_iter()
        .map(|issue| issue.into_summary(requested))
        .collect(),
      total: self.total,
      start_at: self.start_at,
      max_results: self.max_results,
    }
  }
}

impl From<ApiCreatedIssue> for CreatedIssue {
  fn from(c: ApiCreatedIssue) -> Self {
    CreatedIssue { id: c.id, key: c.key }
  }
}

impl From<ApiTransition> for Transition {
  fn from(t: ApiTransition) -> Self {
    Transition {
      id: t.id,
      name: t.name,
      to_status: t.to.name,
    }
  }
}

impl From<ApiComment> for Comment {
  fn from(c: ApiComment) -> Self {
    Comment {
      id: c.id,
      author: c.author.map(|u| u.display_name),
      body: c.body.as_ref().and_then(extract_text).unwrap_or_default(),
      created: c.created,
    }
  }
}

impl From<ApiWorklog> for Worklog {
  fn from(w: ApiWorklog) -> Self {
    Worklog {
      id: w.id,
      author: w.author.map(|u| u.display_name),
      time_spent: w.time_spent,
      time_spent_seconds: w.time_spent_seconds,
      started: w.started,
    }
  }
}

impl From<ApiProject> for Project {
  fn from(p: ApiProject) -> Self {
    Project {
      id: p.id,
      key: p.key,
      name: p.name,
    }
  }
}

impl From<ApiVersion> for Version {
  fn from(v: ApiVersion) -> Self {
    Version {
      id: v.id,
      name: v.name,
      description: v.description,
      released: v.released,
      release_date: v.release_date,
    }
  }
}

impl From<ApiBoard> for Board {
  fn from(b: ApiBoard) -> Self {
    Board {
      id: b.id,
      name: b.name,
      board_type: b.board_type,
    }
  }
}

impl From<ApiUser> for User {
  fn from(u: ApiUser) -> Self {
    User {
      account_id: u.account_id,
      name: u.name,
      display_name: u.display_name,
      email: u.email_address,
      active: u.active,
    }
  }
}

impl From<ApiField> for Field {
  fn from(f: ApiField) -> Self {
    Field {
      id: f.id,
      name: f.name,
      custom: f.custom,
    }
  }
}

impl From<ApiLinkType> for LinkType {
  fn from(l: ApiLinkType) -> Self {
    LinkType {
      id: l.id,
      name: l.name,
      inward: l.inward,
      outward: l.outward,
    }
  }
}

impl From<ApiServerInfo> for ServerInfo {
  fn from(s: ApiServerInfo) -> Self {
    ServerInfo {
      base_url: s.base_url,
      version: s.version,
      deployment_type: s.deployment_type,
      server_title: s.server_title,
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract plain text from Jira's ADF or plain text format
fn extract_text(value: &serde_json::Value) -> Option<String> {
  // If it's a string, return it directly (API v2)
  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }

  // If it's an ADF document (API v3), extract text content
  if let Some(content) = value.get("content").and_then(|v| v.as_array()) {
    let mut text = String::new();
    extract_adf_text(content, &mut text);
    let text = text.trim_end().to_string();
    if !text.is_empty() {
      return Some(text);
    }
  }

  None
}

/// Recursively extract text from ADF content
fn extract_adf_text(content: &[serde_json::Value], output: &mut String) {
  for node in content {
    let Some(node_type) = node.get("type").and_then(|v| v.as_str()) else {
      continue;
    };

    match node_type {
      "text" => {
        if let Some(text) = node.get("text").and_then(|v| v.as_str()) {
          output.push_str(text);
        }
      }
      "hardBreak" => output.push('\n'),
      _ => {
        if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
          extract_adf_text(children, output);
        }
        if matches!(node_type, "paragraph" | "heading" | "codeBlock") {
          output.push('\n');
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_issue_with_adf_description_and_links() {
    let raw = json!({
      "key": "PROJ-1",
      "fields": {
        "summary": "Crash on start",
        "status": {"id": "3", "name": "In Progress"},
        "issuetype": {"name": "Bug"},
        "labels": ["bug"],
        "components": [{"name": "core"}],
        "description": {
          "type": "doc",
          "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "Steps"}]},
            {"type": "paragraph", "content": [{"type": "text", "text": "1. run"}]}
          ]
        },
        "issuelinks": [
          {"id": "100", "type": {"inward": "is blocked by", "outward": "blocks"},
           "outwardIssue": {"key": "PROJ-2"}},
          {"id": "101", "type": {"inward": "is blocked by", "outward": "blocks"},
           "inwardIssue": {"key": "PROJ-3"}}
        ]
      }
    });

    let issue: ApiIssue = serde_json::from_value(raw).unwrap();
    let issue = issue.into_full(&[], &[]);

    assert_eq!(issue.description.as_deref(), Some("Steps\n1. run"));
    assert_eq!(issue.components, vec!["core"]);
    assert_eq!(issue.links[0].relation, "blocks");
    assert_eq!(issue.links[0].issue_key, "PROJ-2");
    assert_eq!(issue.links[1].relation, "is blocked by");
    assert_eq!(issue.links[1].issue_key, "PROJ-3");
  }

  #[test]
  fn test_search_page_conversion() {
    let raw = json!({
      "startAt": 0, "maxResults": 50, "total": 1,
      "issues": [{"key": "PROJ-1", "fields": {"summary": "a", "updated": "2024-01-01"}}]
    });
    let page: ApiIssuePage = serde_json::from_value(raw).unwrap();
    let result = page.into_result(&[]);
    assert_eq!(result.total, 1);
    assert_eq!(result.issues[0].key, "PROJ-1");
    assert_eq!(result.issues[0].status, "");
    assert!(result.issues[0].extra.is_empty());
  }

  #[test]
  fn test_requested_search_fields_are_kept() {
    let raw = json!({
      "total": 1,
      "issues": [{"key": "PROJ-1", "fields": {
        "summary": "a",
        "labels": ["bug", "ui"],
        "customfield_10014": "EPIC-7",
        "customfield_10020": null,
        "fixVersions": [{"name": "1.0"}]
      }}]
    });
    let page: ApiIssuePage = serde_json::from_value(raw).unwrap();
    let requested: Vec<String> = ["labels", "customfield_10014", "customfield_10020", "summary"]
      .iter()
      .map(|f| f.to_string())
      .collect();

    let summary = &page.into_result(&requested).issues[0];

    assert_eq!(summary.extra["labels"], json!(["bug", "ui"]));
    assert_eq!(summary.extra["customfield_10014"], json!("EPIC-7"));
    // Nulls, modelled fields and unrequested fields are not repeated
    assert_eq!(summary.extra.len(), 2);
  }

  #[test]
  fn test_requested_fields_and_expansions_on_issue() {
    let raw = json!({
      "id": "10001",
      "key": "PROJ-1",
      "expand": "renderedFields,names,changelog",
      "fields": {"summary": "a", "customfield_10014": "EPIC-7", "labels": ["x"]},
      "changelog": {"histories": [{"id": "1", "items": []}]},
      "renderedFields": {"description": "<p>hi</p>"}
    });
    let issue: ApiIssue = serde_json::from_value(raw).unwrap();

    let fields = vec!["customfield_10014".to_string(), "labels".to_string()];
    let expand = vec!["changelog".to_string()];
    let issue = issue.into_full(&fields, &expand);

    assert_eq!(issue.labels, vec!["x"]);
    assert_eq!(issue.extra.len(), 1);
    assert_eq!(issue.extra["customfield_10014"], json!("EPIC-7"));
    assert_eq!(issue.expanded.len(), 1);
    assert_eq!(issue.expanded["changelog"]["histories"][0]["id"], "1");
  }

  #[test]
  fn test_error_body_summary() {
    let body: ApiErrorBody = serde_json::from_value(json!({
      "errorMessages": ["Issue does not exist"],
      "errors": {"summary": "Field is required"}
    }))
    .unwrap();
    assert_eq!(
      body.summary().as_deref(),
      Some("Issue does not exist; summary: Field is required")
    );
    assert_eq!(ApiErrorBody::default().summary(), None);
  }
}
