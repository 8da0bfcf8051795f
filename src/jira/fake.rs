//! In-memory `JiraApi` used by tests. Counts every call so tests can assert
//! how often the remote side was reached.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::api::JiraApi;
use super::types::{
  Board, Comment, CreatedIssue, Field, Headers, Issue, IssueLinkRef, IssueRequest, IssueSummary,
  IssueUpdate, LinkType, NewIssue, NewIssueLink, NewVersion, NewWorklog, Project, SearchRequest,
  SearchResult, ServerInfo, Transition, User, Version, Worklog,
};

const TIMESTAMP: &str = "2024-05-01T09:30:00.000+0000";

#[derive(Default)]
struct State {
  issues: BTreeMap<String, Issue>,
  versions: Vec<(String, Version)>,
  users: Vec<User>,
  next_id: u64,
  calls: HashMap<&'static str, usize>,
  fail_next: HashSet<&'static str>,
  last_headers: Option<Headers>,
}

#[derive(Default)]
pub struct FakeJira {
  state: Mutex<State>,
}

impl FakeJira {
  /// Project PROJ with two issues, one version and one user.
  pub fn with_sample_data() -> Self {
    let fake = Self::default();
    {
      let mut state = fake.state.lock().unwrap();
      for (n, summary) in [(1, "First issue"), (2, "Second issue")] {
        let key = format!("PROJ-{}", n);
        state.issues.insert(key.clone(), issue(&key, summary));
      }
      state.next_id = 3;
      state.versions.push((
        "PROJ".into(),
        Version {
          id: "100".into(),
          name: "1.0".into(),
          description: None,
          released: true,
          release_date: Some("2024-01-01".into()),
        },
      ));
      state.users.push(User {
        account_id: Some("acc-ada".into()),
        name: None,
        display_name: "Ada Lovelace".into(),
        email: Some("ada@example.com".into()),
        active: true,
      });
    }
    fake
  }

  /// Number of times `method` was called.
  pub fn calls(&self, method: &str) -> usize {
    self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.state.lock().unwrap().calls.values().sum()
  }

  /// Make the next call to `method` fail with an HTTP-like error.
  pub fn fail_next(&self, method: &'static str) {
    self.state.lock().unwrap().fail_next.insert(method);
  }

  pub fn last_headers(&self) -> Option<Headers> {
    self.state.lock().unwrap().last_headers.clone()
  }

  fn enter(&self, method: &'static str, headers: &Headers) -> Result<std::sync::MutexGuard<'_, State>> {
    let mut state = self.state.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *state.calls.entry(method).or_default() += 1;
    state.last_headers = Some(headers.clone());
    if state.fail_next.remove(method) {
      return Err(eyre!("Jira returned 503 Service Unavailable for {}", method));
    }
    Ok(state)
  }
}

fn issue(key: &str, summary: &str) -> Issue {
  Issue {
    key: key.to_string(),
    summary: summary.to_string(),
    description: None,
    status: "To Do".into(),
    issue_type: "Task".into(),
    assignee: None,
    reporter: None,
    priority: Some("Medium".into()),
    labels: vec![],
    components: vec![],
    created: TIMESTAMP.into(),
    updated: TIMESTAMP.into(),
    links: vec![],
    extra: BTreeMap::new(),
    expanded: BTreeMap::new(),
  }
}

/// Summary carrying the requested `labels`/`components`, like Jira would.
fn summarize(issue: &Issue, requested: &[String]) -> IssueSummary {
  let extra = requested
    .iter()
    .filter_map(|name| {
      let value = match name.as_str() {
        "labels" => json!(issue.labels),
        "components" => json!(issue.components),
        _ => return None,
      };
      Some((name.clone(), value))
    })
    .collect();
  IssueSummary {
    key: issue.key.clone(),
    summary: issue.summary.clone(),
    status: issue.status.clone(),
    issue_type: issue.issue_type.clone(),
    assignee: issue.assignee.clone(),
    priority: issue.priority.clone(),
    updated: issue.updated.clone(),
    extra,
  }
}

fn missing(key: &str) -> color_eyre::Report {
  eyre!("Jira returned 404 Not Found for issue {}", key)
}

#[async_trait]
impl JiraApi for FakeJira {
  async fn search_issues(&self, request: &SearchRequest, headers: &Headers) -> Result<SearchResult> {
    let state = self.enter("search_issues", headers)?;
    let issues: Vec<IssueSummary> = state
      .issues
      .values()
      .skip(request.start_at as usize)
      .take(request.max_results as usize)
      .map(|issue| summarize(issue, &request.fields))
      .collect();
    Ok(SearchResult {
      total: state.issues.len() as u64,
      start_at: request.start_at as u64,
      max_results: request.max_results as u64,
      issues,
    })
  }

  async fn get_issue(&self, request: &IssueRequest, headers: &Headers) -> Result<Issue> {
    let state = self.enter("get_issue", headers)?;
    let mut issue = state
      .issues
      .get(&request.issue_key)
      .cloned()
      .ok_or_else(|| missing(&request.issue_key))?;
    if request.expand.iter().any(|e| e == "changelog") {
      issue.expanded.insert("changelog".into(), json!({ "histories": [] }));
    }
    Ok(issue)
  }

  async fn get_transitions(&self, issue_key: &str, headers: &Headers) -> Result<Vec<Transition>> {
    let state = self.enter("get_transitions", headers)?;
    let issue = state.issues.get(issue_key).ok_or_else(|| missing(issue_key))?;
    let to = if issue.status == "Done" { "To Do" } else { "Done" };
    Ok(vec![Transition {
      id: "31".into(),
      name: format!("Move to {}", to),
      to_status: to.into(),
    }])
  }

  async fn create_issue(&self, new: &NewIssue, headers: &Headers) -> Result<CreatedIssue> {
    let mut state = self.enter("create_issue", headers)?;
    let id = state.next_id;
    state.next_id += 1;
    let key = format!("{}-{}", new.project_key, id);

    let mut created = issue(&key, &new.summary);
    created.issue_type = new.issue_type.clone();
    created.description = new.description.clone();
    created.labels = new.labels.clone();
    created.components = new.components.clone();
    created.assignee = new.assignee.as_ref().map(|u| u.display_name.clone());
    if new.priority.is_some() {
      created.priority = new.priority.clone();
    }
    state.issues.insert(key.clone(), created);

    Ok(CreatedIssue {
      id: id.to_string(),
      key,
    })
  }

  async fn update_issue(&self, issue_key: &str, update: &IssueUpdate, headers: &Headers) -> Result<()> {
    let mut state = self.enter("update_issue", headers)?;
    let issue = state.issues.get_mut(issue_key).ok_or_else(|| missing(issue_key))?;
    if let Some(summary) = &update.summary {
      issue.summary = summary.clone();
    }
    if let Some(description) = &update.description {
      issue.description = Some(description.clone());
    }
    if let Some(labels) = &update.labels {
      issue.labels = labels.clone();
    }
    if let Some(priority) = &update.priority {
      issue.priority = Some(priority.clone());
    }
    Ok(())
  }

  async fn delete_issue(&self, issue_key: &str, headers: &Headers) -> Result<()> {
    let mut state = self.enter("delete_issue", headers)?;
    state.issues.remove(issue_key).map(|_| ()).ok_or_else(|| missing(issue_key))
  }

  async fn transition_issue(
    &self,
    issue_key: &str,
    transition_id: &str,
    _comment: Option<&str>,
    headers: &Headers,
  ) -> Result<()> {
    let mut state = self.enter("transition_issue", headers)?;
    if transition_id != "31" {
      return Err(eyre!("Jira returned 400 Bad Request: transition {} is not valid", transition_id));
    }
    let issue = state.issues.get_mut(issue_key).ok_or_else(|| missing(issue_key))?;
    issue.status = if issue.status == "Done" { "To Do".into() } else { "Done".into() };
    Ok(())
  }

  async fn add_comment(&self, issue_key: &str, body: &str, headers: &Headers) -> Result<Comment> {
    let state = self.enter("add_comment", headers)?;
    if !state.issues.contains_key(issue_key) {
      return Err(missing(issue_key));
    }
    Ok(Comment {
      id: "5000".into(),
      author: Some("Ada Lovelace".into()),
      body: body.to_string(),
      created: TIMESTAMP.into(),
    })
  }

  async fn add_worklog(&self, issue_key: &str, worklog: &NewWorklog, headers: &Headers) -> Result<Worklog> {
    let state = self.enter("add_worklog", headers)?;
    if !state.issues.contains_key(issue_key) {
      return Err(missing(issue_key));
    }
    Ok(Worklog {
      id: "7000".into(),
      author: Some("Ada Lovelace".into()),
      time_spent: worklog.time_spent.clone(),
      time_spent_seconds: 3600,
      started: worklog.started.clone().unwrap_or_else(|| TIMESTAMP.into()),
    })
  }

  async fn assign_issue(&self, issue_key: &str, assignee: &User, headers: &Headers) -> Result<()> {
    let mut state = self.enter("assign_issue", headers)?;
    let issue = state.issues.get_mut(issue_key).ok_or_else(|| missing(issue_key))?;
    issue.assignee = Some(assignee.display_name.clone());
    Ok(())
  }

  async fn search_users(&self, query: &str, headers: &Headers) -> Result<Vec<User>> {
    let state = self.enter("search_users", headers)?;
    let needle = query.to_lowercase();
    Ok(
      state
        .users
        .iter()
        .filter(|u| {
          u.matches(query)
            || u.display_name.to_lowercase().contains(&needle)
            || u.email.as_deref().is_some_and(|e| e.to_lowercase().starts_with(&needle))
        })
        .cloned()
        .collect(),
    )
  }

  async fn list_projects(&self, headers: &Headers) -> Result<Vec<Project>> {
    self.enter("list_projects", headers)?;
    Ok(vec![Project {
      id: "10000".into(),
      key: "PROJ".into(),
      name: "Project".into(),
    }])
  }

  async fn list_versions(&self, project_key: &str, headers: &Headers) -> Result<Vec<Version>> {
    let state = self.enter("list_versions", headers)?;
    Ok(
      state
        .versions
        .iter()
        .filter(|(project, _)| project == project_key)
        .map(|(_, v)| v.clone())
        .collect(),
    )
  }

  async fn create_version(&self, version: &NewVersion, headers: &Headers) -> Result<Version> {
    let mut state = self.enter("create_version", headers)?;
    let created = Version {
      id: (100 + state.versions.len()).to_string(),
      name: version.name.clone(),
      description: version.description.clone(),
      released: false,
      release_date: version.release_date.clone(),
    };
    state.versions.push((version.project_key.clone(), created.clone()));
    Ok(created)
  }

  async fn list_boards(&self, _project_key: Option<&str>, headers: &Headers) -> Result<Vec<Board>> {
    self.enter("list_boards", headers)?;
    Ok(vec![Board {
      id: 1,
      name: "PROJ board".into(),
      board_type: "scrum".into(),
    }])
  }

  async fn get_board_issues(&self, board_id: u64, _jql: Option<&str>, headers: &Headers) -> Result<SearchResult> {
    let state = self.enter("get_board_issues", headers)?;
    if board_id != 1 {
      return Err(eyre!("Jira returned 404 Not Found for board {}", board_id));
    }
    let issues: Vec<IssueSummary> = state.issues.values().map(|issue| summarize(issue, &[])).collect();
    Ok(SearchResult {
      total: issues.len() as u64,
      start_at: 0,
      max_results: issues.len() as u64,
      issues,
    })
  }

  async fn get_fields(&self, headers: &Headers) -> Result<Vec<Field>> {
    self.enter("get_fields", headers)?;
    Ok(vec![Field {
      id: "summary".into(),
      name: "Summary".into(),
      custom: false,
    }])
  }

  async fn get_link_types(&self, headers: &Headers) -> Result<Vec<LinkType>> {
    self.enter("get_link_types", headers)?;
    Ok(vec![LinkType {
      id: "1".into(),
      name: "Blocks".into(),
      inward: "is blocked by".into(),
      outward: "blocks".into(),
    }])
  }

  async fn create_issue_link(&self, link: &NewIssueLink, headers: &Headers) -> Result<()> {
    let mut state = self.enter("create_issue_link", headers)?;
    for key in [&link.inward_issue, &link.outward_issue] {
      if !state.issues.contains_key(key.as_str()) {
        return Err(missing(key));
      }
    }
    let id = (10000 + state.next_id).to_string();
    state.next_id += 1;
    if let Some(outward) = state.issues.get_mut(&link.outward_issue) {
      outward.links.push(IssueLinkRef {
        id,
        relation: "is blocked by".into(),
        issue_key: link.inward_issue.clone(),
      });
    }
    Ok(())
  }

  async fn remove_issue_link(&self, _link_id: &str, headers: &Headers) -> Result<()> {
    self.enter("remove_issue_link", headers)?;
    Ok(())
  }

  async fn get_server_info(&self, headers: &Headers) -> Result<ServerInfo> {
    self.enter("get_server_info", headers)?;
    Ok(ServerInfo {
      base_url: "https://example.atlassian.net".into(),
      version: "1001.0.0".into(),
      deployment_type: Some("Cloud".into()),
      server_title: Some("Jira".into()),
    })
  }
}
