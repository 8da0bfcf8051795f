//! Jira operations with transparent caching and post-write invalidation.

use chrono::{DateTime, NaiveDate};
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{generate_key, CacheLayer, Invalidation, NAMESPACE, VERSIONS_TAG};
use crate::config::TtlConfig;
use crate::error::{require, ToolError};

use super::api::JiraApi;
use super::types::{
  Board, Comment, CreatedIssue, Field, Headers, Issue, IssueRequest, IssueUpdate, LinkType,
  NewIssue, NewIssueLink, NewVersion, NewWorklog, Project, SearchRequest, SearchResult,
  ServerInfo, Transition, User, Version, Worklog,
};

/// Jira's timestamp format for worklog `started`.
const JIRA_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Jira client with transparent caching support.
///
/// Reads go through the cache keyed on their request parameters only.
/// Writes validate their input before any network call and invalidate
/// affected entries once the remote call has succeeded.
#[derive(Clone)]
pub struct JiraService {
  api: Arc<dyn JiraApi>,
  cache: CacheLayer,
  ttl: TtlConfig,
}

/// Fields of a new issue as supplied by a caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct IssueDraft {
  pub project_key: Option<String>,
  pub summary: Option<String>,
  pub issue_type: Option<String>,
  pub description: Option<String>,
  pub labels: Vec<String>,
  pub components: Vec<String>,
  pub priority: Option<String>,
  pub assignee: Option<String>,
}

/// Canonical form of an issue key: trimmed and upper-cased.
pub fn normalize_issue_key(key: &str) -> String {
  key.trim().to_uppercase()
}

/// Require `value` to be an issue key such as `PROJ-123` and normalize it.
///
/// Numeric issue ids are rejected so that reads and invalidation always
/// agree on one identifier per issue.
fn require_issue_key(value: &str, field: &str) -> Result<String> {
  let key = normalize_issue_key(require(Some(value), field)?);
  if is_issue_key(&key) {
    Ok(key)
  } else {
    Err(
      ToolError::validation(format!(
        "{} must be an issue key such as PROJ-123, got '{}'",
        field,
        value.trim()
      ))
      .into(),
    )
  }
}

/// `PROJ-123` shape: a project key starting with a letter, a dash, digits.
fn is_issue_key(key: &str) -> bool {
  let Some((project, number)) = key.rsplit_once('-') else {
    return false;
  };
  let mut project = project.chars();
  project.next().is_some_and(|c| c.is_ascii_uppercase())
    && project.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    && !number.is_empty()
    && number.chars().all(|c| c.is_ascii_digit())
}

impl JiraService {
  pub fn new(api: Arc<dyn JiraApi>, cache: CacheLayer, ttl: TtlConfig) -> Self {
    Self { api, cache, ttl }
  }

  async fn cached<T, P, F, Fut>(&self, operation: &str, params: &P, ttl: Duration, fetch: F) -> Result<T>
  where
    T: serde::Serialize + serde::de::DeserializeOwned,
    P: serde::Serialize + ?Sized,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
  {
    let key = generate_key(NAMESPACE, operation, params)?;
    self.cache.get_or_set(&key, ttl, fetch).await
  }

  fn invalidate(&self, rule: Invalidation<'_>) {
    let deleted = self.cache.invalidate(rule);
    debug!(?rule, deleted, "invalidated after write");
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  /// Search for issues using JQL with caching.
  pub async fn search_issues(&self, request: SearchRequest, headers: &Headers) -> Result<SearchResult> {
    require(Some(request.jql.as_str()), "jql")?;

    self
      .cached("search", &request, self.ttl.search(), || {
        self.api.search_issues(&request, headers)
      })
      .await
  }

  /// Get a single issue by key with caching.
  pub async fn get_issue(&self, mut request: IssueRequest, headers: &Headers) -> Result<Issue> {
    request.issue_key = require_issue_key(&request.issue_key, "issue_key")?;

    self
      .cached("issue", &request, self.ttl.search(), || {
        self.api.get_issue(&request, headers)
      })
      .await
  }

  pub async fn get_transitions(&self, issue_key: &str, headers: &Headers) -> Result<Vec<Transition>> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;

    self
      .cached(
        "transitions",
        &serde_json::json!({ "issue_key": issue_key }),
        self.ttl.search(),
        || self.api.get_transitions(&issue_key, headers),
      )
      .await
  }

  pub async fn list_projects(&self, headers: &Headers) -> Result<Vec<Project>> {
    self
      .cached("projects", &serde_json::json!({}), self.ttl.listing(), || {
        self.api.list_projects(headers)
      })
      .await
  }

  pub async fn list_versions(&self, project_key: &str, headers: &Headers) -> Result<Vec<Version>> {
    let project_key = require(Some(project_key), "project_key")?.to_uppercase();

    self
      .cached(
        "versions",
        &serde_json::json!({ "project_key": project_key }),
        self.ttl.listing(),
        || self.api.list_versions(&project_key, headers),
      )
      .await
  }

  /// Get all boards with caching.
  pub async fn list_boards(&self, project_key: Option<&str>, headers: &Headers) -> Result<Vec<Board>> {
    let project_key = project_key
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .map(str::to_uppercase);

    self
      .cached(
        "boards",
        &serde_json::json!({ "project_key": project_key }),
        self.ttl.listing(),
        || self.api.list_boards(project_key.as_deref(), headers),
      )
      .await
  }

  /// Get issues for a specific board with caching.
  pub async fn get_board_issues(
    &self,
    board_id: u64,
    jql: Option<&str>,
    headers: &Headers,
  ) -> Result<SearchResult> {
    let jql = jql.map(str::trim).filter(|j| !j.is_empty());

    self
      .cached(
        "board_issues",
        &serde_json::json!({ "board_id": board_id, "jql": jql }),
        self.ttl.search(),
        || self.api.get_board_issues(board_id, jql, headers),
      )
      .await
  }

  pub async fn get_fields(&self, headers: &Headers) -> Result<Vec<Field>> {
    self
      .cached("fields", &serde_json::json!({}), self.ttl.reference(), || {
        self.api.get_fields(headers)
      })
      .await
  }

  pub async fn get_link_types(&self, headers: &Headers) -> Result<Vec<LinkType>> {
    self
      .cached("link_types", &serde_json::json!({}), self.ttl.reference(), || {
        self.api.get_link_types(headers)
      })
      .await
  }

  pub async fn get_server_info(&self, headers: &Headers) -> Result<ServerInfo> {
    self
      .cached("server_info", &serde_json::json!({}), self.ttl.reference(), || {
        self.api.get_server_info(headers)
      })
      .await
  }

  /// Resolve a user by account id, login, email or display name.
  ///
  /// Zero matches is a `NotFound`. Among several matches an exact one wins,
  /// otherwise the first active user is taken.
  pub async fn resolve_user(&self, identifier: &str, headers: &Headers) -> Result<User> {
    let identifier = require(Some(identifier), "user identifier")?.to_string();

    let candidates: Vec<User> = self
      .cached(
        "user",
        &serde_json::json!({ "query": identifier }),
        self.ttl.listing(),
        || self.api.search_users(&identifier, headers),
      )
      .await?;

    let exact = candidates.iter().find(|u| u.matches(&identifier));
    let chosen = exact.or_else(|| candidates.iter().find(|u| u.active));

    chosen
      .cloned()
      .ok_or_else(|| ToolError::not_found("user", identifier.as_str()).into())
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  pub async fn create_issue(&self, draft: IssueDraft, headers: &Headers) -> Result<CreatedIssue> {
    let project_key = require(draft.project_key.as_deref(), "project_key")?.to_uppercase();
    let summary = require(draft.summary.as_deref(), "summary")?.to_string();
    let issue_type = require(draft.issue_type.as_deref(), "issue_type")?.to_string();

    let assignee = match draft.assignee.as_deref().map(str::trim) {
      Some(id) if !id.is_empty() => Some(self.resolve_user(id, headers).await?),
      _ => None,
    };

    let issue = NewIssue {
      project_key,
      summary,
      issue_type,
      description: draft.description,
      labels: draft.labels,
      components: draft.components,
      priority: draft.priority,
      assignee,
    };

    let created = self.api.create_issue(&issue, headers).await?;
    self.invalidate(Invalidation::Issue(&created.key));
    Ok(created)
  }

  pub async fn update_issue(
    &self,
    issue_key: &str,
    update: IssueUpdate,
    headers: &Headers,
  ) -> Result<()> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;
    if update.is_empty() {
      return Err(ToolError::validation("at least one field to update is required").into());
    }
    if let Some(summary) = &update.summary {
      require(Some(summary.as_str()), "summary")?;
    }

    self.api.update_issue(&issue_key, &update, headers).await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(())
  }

  pub async fn delete_issue(&self, issue_key: &str, headers: &Headers) -> Result<()> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;

    self.api.delete_issue(&issue_key, headers).await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(())
  }

  pub async fn transition_issue(
    &self,
    issue_key: &str,
    transition_id: &str,
    comment: Option<&str>,
    headers: &Headers,
  ) -> Result<()> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;
    let transition_id = require(Some(transition_id), "transition_id")?;
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());

    self
      .api
      .transition_issue(&issue_key, transition_id, comment, headers)
      .await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(())
  }

  pub async fn add_comment(&self, issue_key: &str, body: &str, headers: &Headers) -> Result<Comment> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;
    let body = require(Some(body), "body")?;

    let comment = self.api.add_comment(&issue_key, body, headers).await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(comment)
  }

  pub async fn add_worklog(
    &self,
    issue_key: &str,
    time_spent: &str,
    comment: Option<String>,
    started: Option<&str>,
    headers: &Headers,
  ) -> Result<Worklog> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;
    let time_spent = require(Some(time_spent), "time_spent")?.to_string();
    let started = started
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(parse_started)
      .transpose()?;

    let worklog = NewWorklog {
      time_spent,
      comment,
      started,
    };

    let logged = self.api.add_worklog(&issue_key, &worklog, headers).await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(logged)
  }

  pub async fn assign_issue(&self, issue_key: &str, assignee: &str, headers: &Headers) -> Result<User> {
    let issue_key = require_issue_key(issue_key, "issue_key")?;
    let user = self.resolve_user(assignee, headers).await?;

    self.api.assign_issue(&issue_key, &user, headers).await?;
    self.invalidate(Invalidation::Issue(&issue_key));
    Ok(user)
  }

  pub async fn create_version(
    &self,
    project_key: &str,
    name: &str,
    description: Option<String>,
    release_date: Option<&str>,
    headers: &Headers,
  ) -> Result<Version> {
    let project_key = require(Some(project_key), "project_key")?.to_uppercase();
    let name = require(Some(name), "name")?.to_string();
    let release_date = release_date
      .map(str::trim)
      .filter(|d| !d.is_empty())
      .map(|d| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
          .map(|_| d.to_string())
          .map_err(|_| ToolError::validation(format!("release_date must be YYYY-MM-DD, got {}", d)))
      })
      .transpose()?;

    let version = NewVersion {
      project_key,
      name,
      description,
      release_date,
    };

    let created = self.api.create_version(&version, headers).await?;
    self.invalidate(Invalidation::Collection(VERSIONS_TAG));
    Ok(created)
  }

  pub async fn link_issues(
    &self,
    link_type: &str,
    inward_issue: &str,
    outward_issue: &str,
    comment: Option<String>,
    headers: &Headers,
  ) -> Result<()> {
    let link = NewIssueLink {
      link_type: require(Some(link_type), "link_type")?.to_string(),
      inward_issue: require_issue_key(inward_issue, "inward_issue")?,
      outward_issue: require_issue_key(outward_issue, "outward_issue")?,
      comment,
    };

    self.api.create_issue_link(&link, headers).await?;
    self.invalidate(Invalidation::IssueLink {
      inward: &link.inward_issue,
      outward: &link.outward_issue,
    });
    Ok(())
  }

  pub async fn remove_issue_link(&self, link_id: &str, headers: &Headers) -> Result<()> {
    let link_id = require(Some(link_id), "link_id")?;

    self.api.remove_issue_link(link_id, headers).await?;
    self.invalidate(Invalidation::LinkRemoved);
    Ok(())
  }
}

/// Accept RFC 3339 and re-emit in the format Jira's worklog API expects.
fn parse_started(value: &str) -> Result<String> {
  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.format(JIRA_DATETIME).to_string())
    .map_err(|_| {
      ToolError::validation(format!(
        "started must be an RFC 3339 timestamp such as 2024-05-01T09:30:00Z, got {}",
        value
      ))
      .into()
    })
}
