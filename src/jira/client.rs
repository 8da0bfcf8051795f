use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use crate::config::{AuthType, Config, JiraConfig};
use crate::jira::api::JiraApi;
use crate::jira::api_types::{
  ApiBoard, ApiComment, ApiCreatedIssue, ApiErrorBody, ApiField, ApiIssue, ApiIssuePage,
  ApiLinkTypesResponse, ApiProject, ApiServerInfo, ApiTransitionsResponse, ApiUser,
  ApiValuesPage, ApiVersion, ApiWorklog,
};
use crate::jira::types::{
  Board, Comment, CreatedIssue, Field, Headers, Issue, IssueRequest, IssueUpdate, LinkType,
  NewIssue, NewIssueLink, NewVersion, NewWorklog, Project, SearchRequest, SearchResult,
  ServerInfo, Transition, User, Version, Worklog,
};

/// Fields every issue summary needs, requested on top of caller-selected ones.
const SUMMARY_FIELDS: &[&str] = &["summary", "status", "issuetype", "assignee", "priority", "updated"];

const PAGE_SIZE: u64 = 50;

#[derive(Clone)]
enum Auth {
  /// Jira Cloud: email + API token
  Basic { user: String, token: String },
  /// Jira Server/DC: personal access token
  Bearer(String),
}

#[derive(Clone, Copy)]
enum ApiRoot {
  Rest,
  Agile,
}

impl ApiRoot {
  fn segments(self) -> &'static [&'static str] {
    match self {
      ApiRoot::Rest => &["rest", "api", "2"],
      ApiRoot::Agile => &["rest", "agile", "1.0"],
    }
  }
}

/// Jira REST client
#[derive(Clone)]
pub struct JiraClient {
  http: reqwest::Client,
  base_url: Url,
  auth: Auth,
}

impl JiraClient {
  pub fn new(config: &JiraConfig) -> Result<Self> {
    let base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid Jira URL {}: {}", config.url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid Jira URL {}: not a base URL", config.url));
    }

    let auth = match config.resolved_auth_type() {
      AuthType::Onpremise => Auth::Bearer(Config::get_personal_token()?),
      AuthType::Cloud | AuthType::Auto => Auth::Basic {
        user: config.email.clone(),
        token: Config::get_api_token()?,
      },
    };

    let http = reqwest::Client::builder()
      .user_agent(concat!("jira-mcp/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      auth,
    })
  }

  fn endpoint(&self, root: ApiRoot, segments: &[&str]) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Jira URL cannot be a base: {}", self.base_url))?
      .pop_if_empty()
      .extend(root.segments())
      .extend(segments);
    Ok(url)
  }

  async fn send(
    &self,
    method: Method,
    url: Url,
    query: &[(&str, String)],
    body: Option<Value>,
    headers: &Headers,
  ) -> Result<reqwest::Response> {
    let mut request = self
      .http
      .request(method.clone(), url.clone())
      .header(ACCEPT, "application/json");

    request = match &self.auth {
      Auth::Basic { user, token } => request.basic_auth(user, Some(token)),
      Auth::Bearer(token) => request.bearer_auth(token),
    };
    if !query.is_empty() {
      request = request.query(query);
    }
    for (name, value) in headers {
      request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    debug!(%method, path = url.path(), "jira request");
    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request {} {} failed: {}", method, url.path(), e))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&text)
      .ok()
      .and_then(|b| b.summary())
      .unwrap_or(text);
    Err(eyre!(
      "Jira returned {} for {} {}: {}",
      status,
      method,
      url.path(),
      detail
    ))
  }

  async fn get<T: DeserializeOwned>(
    &self,
    root: ApiRoot,
    segments: &[&str],
    query: &[(&str, String)],
    headers: &Headers,
  ) -> Result<T> {
    let url = self.endpoint(root, segments)?;
    let path = url.path().to_string();
    self
      .send(Method::GET, url, query, None, headers)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  async fn post<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    body: Value,
    headers: &Headers,
  ) -> Result<T> {
    let url = self.endpoint(ApiRoot::Rest, segments)?;
    let path = url.path().to_string();
    self
      .send(Method::POST, url, &[], Some(body), headers)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  /// Send a request whose response body is empty or irrelevant.
  async fn execute(
    &self,
    method: Method,
    segments: &[&str],
    body: Option<Value>,
    headers: &Headers,
  ) -> Result<()> {
    let url = self.endpoint(ApiRoot::Rest, segments)?;
    self.send(method, url, &[], body, headers).await?;
    Ok(())
  }

  fn is_cloud(&self) -> bool {
    matches!(self.auth, Auth::Basic { .. })
  }

  fn user_ref(user: &User) -> Value {
    match (&user.account_id, &user.name) {
      (Some(id), _) => json!({ "accountId": id }),
      (None, Some(name)) => json!({ "name": name }),
      (None, None) => Value::Null,
    }
  }
}

fn named_list(names: &[String]) -> Value {
  Value::Array(names.iter().map(|n| json!({ "name": n })).collect())
}

fn summary_fields(extra: &[String]) -> Vec<String> {
  let mut fields: Vec<String> = SUMMARY_FIELDS.iter().map(|f| f.to_string()).collect();
  for f in extra {
    if !fields.contains(f) {
      fields.push(f.clone());
    }
  }
  fields
}

#[async_trait]
impl JiraApi for JiraClient {
  async fn search_issues(&self, request: &SearchRequest, headers: &Headers) -> Result<SearchResult> {
    let body = json!({
      "jql": request.jql,
      "startAt": request.start_at,
      "maxResults": request.max_results,
      "fields": summary_fields(&request.fields),
    });

    let page: ApiIssuePage = self
      .post(&["search"], body, headers)
      .await
      .map_err(|e| e.wrap_err("Failed to search issues"))?;

    Ok(page.into_result(&request.fields))
  }

  async fn get_issue(&self, request: &IssueRequest, headers: &Headers) -> Result<Issue> {
    let mut query = Vec::new();
    if !request.fields.is_empty() {
      query.push(("fields", request.fields.join(",")));
    }
    if !request.expand.is_empty() {
      query.push(("expand", request.expand.join(",")));
    }

    let issue: ApiIssue = self
      .get(ApiRoot::Rest, &["issue", request.issue_key.as_str()], &query, headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to get issue {}", request.issue_key)))?;

    Ok(issue.into_full(&request.fields, &request.expand))
  }

  async fn get_transitions(&self, issue_key: &str, headers: &Headers) -> Result<Vec<Transition>> {
    let response: ApiTransitionsResponse = self
      .get(ApiRoot::Rest, &["issue", issue_key, "transitions"], &[], headers)
      .await
      .map_err(|e| e.wrap_err("Failed to get transitions"))?;

    Ok(response.transitions.into_iter().map(Transition::from).collect())
  }

  async fn create_issue(&self, issue: &NewIssue, headers: &Headers) -> Result<CreatedIssue> {
    let mut fields = Map::new();
    fields.insert("project".into(), json!({ "key": issue.project_key }));
    fields.insert("summary".into(), json!(issue.summary));
    fields.insert("issuetype".into(), json!({ "name": issue.issue_type }));
    if let Some(description) = &issue.description {
      fields.insert("description".into(), json!(description));
    }
    if !issue.labels.is_empty() {
      fields.insert("labels".into(), json!(issue.labels));
    }
    if !issue.components.is_empty() {
      fields.insert("components".into(), named_list(&issue.components));
    }
    if let Some(priority) = &issue.priority {
      fields.insert("priority".into(), json!({ "name": priority }));
    }
    if let Some(assignee) = &issue.assignee {
      fields.insert("assignee".into(), Self::user_ref(assignee));
    }

    let created: ApiCreatedIssue = self
      .post(&["issue"], json!({ "fields": fields }), headers)
      .await
      .map_err(|e| e.wrap_err("Failed to create issue"))?;

    Ok(created.into())
  }

  async fn update_issue(
    &self,
    issue_key: &str,
    update: &IssueUpdate,
    headers: &Headers,
  ) -> Result<()> {
    let mut fields = Map::new();
    if let Some(summary) = &update.summary {
      fields.insert("summary".into(), json!(summary));
    }
    if let Some(description) = &update.description {
      fields.insert("description".into(), json!(description));
    }
    if let Some(labels) = &update.labels {
      fields.insert("labels".into(), json!(labels));
    }
    if let Some(priority) = &update.priority {
      fields.insert("priority".into(), json!({ "name": priority }));
    }

    self
      .execute(
        Method::PUT,
        &["issue", issue_key],
        Some(json!({ "fields": fields })),
        headers,
      )
      .await
      .map_err(|e| e.wrap_err(format!("Failed to update issue {}", issue_key)))
  }

  async fn delete_issue(&self, issue_key: &str, headers: &Headers) -> Result<()> {
    self
      .execute(Method::DELETE, &["issue", issue_key], None, headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to delete issue {}", issue_key)))
  }

  async fn transition_issue(
    &self,
    issue_key: &str,
    transition_id: &str,
    comment: Option<&str>,
    headers: &Headers,
  ) -> Result<()> {
    let mut body = json!({ "transition": { "id": transition_id } });
    if let Some(comment) = comment {
      body["update"] = json!({ "comment": [{ "add": { "body": comment } }] });
    }

    self
      .execute(
        Method::POST,
        &["issue", issue_key, "transitions"],
        Some(body),
        headers,
      )
      .await
      .map_err(|e| e.wrap_err("Failed to execute transition"))
  }

  async fn add_comment(&self, issue_key: &str, body: &str, headers: &Headers) -> Result<Comment> {
    let comment: ApiComment = self
      .post(&["issue", issue_key, "comment"], json!({ "body": body }), headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to comment on {}", issue_key)))?;

    Ok(comment.into())
  }

  async fn add_worklog(
    &self,
    issue_key: &str,
    worklog: &NewWorklog,
    headers: &Headers,
  ) -> Result<Worklog> {
    let mut body = json!({ "timeSpent": worklog.time_spent });
    if let Some(comment) = &worklog.comment {
      body["comment"] = json!(comment);
    }
    if let Some(started) = &worklog.started {
      body["started"] = json!(started);
    }

    let logged: ApiWorklog = self
      .post(&["issue", issue_key, "worklog"], body, headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to log work on {}", issue_key)))?;

    Ok(logged.into())
  }

  async fn assign_issue(&self, issue_key: &str, assignee: &User, headers: &Headers) -> Result<()> {
    self
      .execute(
        Method::PUT,
        &["issue", issue_key, "assignee"],
        Some(Self::user_ref(assignee)),
        headers,
      )
      .await
      .map_err(|e| e.wrap_err(format!("Failed to assign {}", issue_key)))
  }

  async fn search_users(&self, query: &str, headers: &Headers) -> Result<Vec<User>> {
    // Cloud searches by `query`; Server/DC still expects `username`.
    let param = if self.is_cloud() { "query" } else { "username" };

    let users: Vec<ApiUser> = self
      .get(
        ApiRoot::Rest,
        &["user", "search"],
        &[(param, query.to_string())],
        headers,
      )
      .await
      .map_err(|e| e.wrap_err("Failed to search users"))?;

    Ok(users.into_iter().map(User::from).collect())
  }

  async fn list_projects(&self, headers: &Headers) -> Result<Vec<Project>> {
    let projects: Vec<ApiProject> = self
      .get(ApiRoot::Rest, &["project"], &[], headers)
      .await
      .map_err(|e| e.wrap_err("Failed to list projects"))?;

    Ok(projects.into_iter().map(Project::from).collect())
  }

  async fn list_versions(&self, project_key: &str, headers: &Headers) -> Result<Vec<Version>> {
    let versions: Vec<ApiVersion> = self
      .get(ApiRoot::Rest, &["project", project_key, "versions"], &[], headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to list versions of {}", project_key)))?;

    Ok(versions.into_iter().map(Version::from).collect())
  }

  async fn create_version(&self, version: &NewVersion, headers: &Headers) -> Result<Version> {
    let mut body = json!({
      "name": version.name,
      "project": version.project_key,
    });
    if let Some(description) = &version.description {
      body["description"] = json!(description);
    }
    if let Some(date) = &version.release_date {
      body["releaseDate"] = json!(date);
    }

    let created: ApiVersion = self
      .post(&["version"], body, headers)
      .await
      .map_err(|e| e.wrap_err("Failed to create version"))?;

    Ok(created.into())
  }

  async fn list_boards(&self, project_key: Option<&str>, headers: &Headers) -> Result<Vec<Board>> {
    let mut all_boards = Vec::new();
    let mut start_at = 0u64;

    loop {
      let mut query = vec![
        ("startAt", start_at.to_string()),
        ("maxResults", PAGE_SIZE.to_string()),
      ];
      if let Some(project) = project_key {
        query.push(("projectKeyOrId", project.to_string()));
      }

      let page: ApiValuesPage<ApiBoard> = self
        .get(ApiRoot::Agile, &["board"], &query, headers)
        .await
        .map_err(|e| e.wrap_err("Failed to get boards"))?;

      let count = page.values.len() as u64;
      all_boards.extend(page.values.into_iter().map(Board::from));

      if page.is_last || count == 0 {
        break;
      }
      start_at += count;
    }

    Ok(all_boards)
  }

  async fn get_board_issues(
    &self,
    board_id: u64,
    jql: Option<&str>,
    headers: &Headers,
  ) -> Result<SearchResult> {
    let board = board_id.to_string();
    let fields = SUMMARY_FIELDS.join(",");
    let mut issues = Vec::new();
    let mut start_at = 0u64;
    let mut total;

    loop {
      let mut query = vec![
        ("startAt", start_at.to_string()),
        ("maxResults", PAGE_SIZE.to_string()),
        ("fields", fields.clone()),
      ];
      if let Some(jql) = jql {
        query.push(("jql", jql.to_string()));
      }

      let page: ApiIssuePage = self
        .get(ApiRoot::Agile, &["board", board.as_str(), "issue"], &query, headers)
        .await
        .map_err(|e| e.wrap_err("Failed to get board issues"))?;

      total = page.total;
      let count = page.issues.len() as u64;
      issues.extend(page.issues.into_iter().map(|issue| issue.into_summary(&[])));

      // Check if we've fetched all issues
      if count == 0 || start_at + count >= total {
        break;
      }
      start_at += count;
    }

    Ok(SearchResult {
      max_results: issues.len() as u64,
      issues,
      total,
      start_at: 0,
    })
  }

  async fn get_fields(&self, headers: &Headers) -> Result<Vec<Field>> {
    let fields: Vec<ApiField> = self
      .get(ApiRoot::Rest, &["field"], &[], headers)
      .await
      .map_err(|e| e.wrap_err("Failed to get fields"))?;

    Ok(fields.into_iter().map(Field::from).collect())
  }

  async fn get_link_types(&self, headers: &Headers) -> Result<Vec<LinkType>> {
    let response: ApiLinkTypesResponse = self
      .get(ApiRoot::Rest, &["issueLinkType"], &[], headers)
      .await
      .map_err(|e| e.wrap_err("Failed to get link types"))?;

    Ok(response.issue_link_types.into_iter().map(LinkType::from).collect())
  }

  async fn create_issue_link(&self, link: &NewIssueLink, headers: &Headers) -> Result<()> {
    let mut body = json!({
      "type": { "name": link.link_type },
      "inwardIssue": { "key": link.inward_issue },
      "outwardIssue": { "key": link.outward_issue },
    });
    if let Some(comment) = &link.comment {
      body["comment"] = json!({ "body": comment });
    }

    self
      .execute(Method::POST, &["issueLink"], Some(body), headers)
      .await
      .map_err(|e| e.wrap_err("Failed to link issues"))
  }

  async fn remove_issue_link(&self, link_id: &str, headers: &Headers) -> Result<()> {
    self
      .execute(Method::DELETE, &["issueLink", link_id], None, headers)
      .await
      .map_err(|e| e.wrap_err(format!("Failed to remove link {}", link_id)))
  }

  async fn get_server_info(&self, headers: &Headers) -> Result<ServerInfo> {
    let info: ApiServerInfo = self
      .get(ApiRoot::Rest, &["serverInfo"], &[], headers)
      .await
      .map_err(|e| e.wrap_err("Failed to get server info"))?;

    Ok(info.into())
  }
}
