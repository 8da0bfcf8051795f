//! Domain types exchanged between the tool layer, the cache and the API client.
//!
//! Results are `Serialize + Deserialize` because the cache stores them as JSON.
//! Request types are `Serialize` because their canonical form is the cache key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Extra per-call HTTP headers. Forwarded to Jira, never part of a cache key.
pub type Headers = BTreeMap<String, String>;

pub const DEFAULT_MAX_RESULTS: u32 = 50;

// ============================================================================
// Read requests
// ============================================================================

/// JQL search. Defaults are resolved before the request is keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
  pub jql: String,
  pub fields: Vec<String>,
  pub max_results: u32,
  pub start_at: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRequest {
  pub issue_key: String,
  pub fields: Vec<String>,
  pub expand: Vec<String>,
}

// ============================================================================
// Write requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
  pub project_key: String,
  pub summary: String,
  pub issue_type: String,
  pub description: Option<String>,
  pub labels: Vec<String>,
  pub components: Vec<String>,
  pub priority: Option<String>,
  pub assignee: Option<User>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
  pub summary: Option<String>,
  pub description: Option<String>,
  pub labels: Option<Vec<String>>,
  pub priority: Option<String>,
}

impl IssueUpdate {
  pub fn is_empty(&self) -> bool {
    self.summary.is_none()
      && self.description.is_none()
      && self.labels.is_none()
      && self.priority.is_none()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorklog {
  pub time_spent: String,
  pub comment: Option<String>,
  /// Already in Jira's `yyyy-MM-dd'T'HH:mm:ss.SSSZ` form.
  pub started: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
  pub project_key: String,
  pub name: String,
  pub description: Option<String>,
  pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssueLink {
  pub link_type: String,
  pub inward_issue: String,
  pub outward_issue: String,
  pub comment: Option<String>,
}

// ============================================================================
// Results
// ============================================================================

/// Summary of an issue for list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
  pub key: String,
  pub summary: String,
  pub status: String,
  pub issue_type: String,
  pub assignee: Option<String>,
  pub priority: Option<String>,
  pub updated: String,
  /// Requested fields not modelled above, by Jira field id.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
  pub issues: Vec<IssueSummary>,
  pub total: u64,
  pub start_at: u64,
  pub max_results: u64,
}

/// Full issue details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  pub key: String,
  pub summary: String,
  pub description: Option<String>,
  pub status: String,
  pub issue_type: String,
  pub assignee: Option<String>,
  pub reporter: Option<String>,
  pub priority: Option<String>,
  pub labels: Vec<String>,
  pub components: Vec<String>,
  pub created: String,
  pub updated: String,
  #[serde(default)]
  pub links: Vec<IssueLinkRef>,
  /// Requested fields not modelled above, by Jira field id.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, Value>,
  /// Requested expansions such as `changelog` or `renderedFields`.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub expanded: BTreeMap<String, Value>,
}

/// A link as seen from one of its issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLinkRef {
  pub id: String,
  /// Relationship phrase from this issue's point of view, e.g. "blocks".
  pub relation: String,
  pub issue_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
  pub id: String,
  pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
  pub id: String,
  pub name: String,
  pub to_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id: String,
  pub author: Option<String>,
  pub body: String,
  pub created: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worklog {
  pub id: String,
  pub author: Option<String>,
  pub time_spent: String,
  pub time_spent_seconds: u64,
  pub started: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub id: String,
  pub key: String,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
  pub id: String,
  pub name: String,
  pub description: Option<String>,
  pub released: bool,
  pub release_date: Option<String>,
}

/// Board summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
  pub id: u64,
  pub name: String,
  pub board_type: String, // "scrum" or "kanban"
}

/// A Jira user. Cloud identifies users by `account_id`, Server/DC by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub account_id: Option<String>,
  pub name: Option<String>,
  pub display_name: String,
  pub email: Option<String>,
  pub active: bool,
}

impl User {
  /// Whether `identifier` names this user exactly (account id, login, email or display name).
  pub fn matches(&self, identifier: &str) -> bool {
    let id = identifier.trim();
    self.account_id.as_deref() == Some(id)
      || self.name.as_deref() == Some(id)
      || self
        .email
        .as_deref()
        .is_some_and(|e| e.eq_ignore_ascii_case(id))
      || self.display_name.eq_ignore_ascii_case(id)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
  pub id: String,
  pub name: String,
  pub custom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkType {
  pub id: String,
  pub name: String,
  pub inward: String,
  pub outward: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
  pub base_url: String,
  pub version: String,
  pub deployment_type: Option<String>,
  pub server_title: Option<String>,
}
