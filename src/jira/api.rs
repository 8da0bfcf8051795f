//! The remote service boundary.
//!
//! Everything the cache and tool layers know about Jira goes through this
//! trait, which lets tests substitute an in-memory fake.

use async_trait::async_trait;
use color_eyre::Result;

use super::types::{
  Board, Comment, CreatedIssue, Field, Headers, Issue, IssueRequest, IssueUpdate, LinkType,
  NewIssue, NewIssueLink, NewVersion, NewWorklog, Project, SearchRequest, SearchResult,
  ServerInfo, Transition, User, Version, Worklog,
};

#[async_trait]
pub trait JiraApi: Send + Sync {
  async fn search_issues(&self, request: &SearchRequest, headers: &Headers) -> Result<SearchResult>;

  async fn get_issue(&self, request: &IssueRequest, headers: &Headers) -> Result<Issue>;

  async fn get_transitions(&self, issue_key: &str, headers: &Headers) -> Result<Vec<Transition>>;

  async fn create_issue(&self, issue: &NewIssue, headers: &Headers) -> Result<CreatedIssue>;

  async fn update_issue(&self, issue_key: &str, update: &IssueUpdate, headers: &Headers)
    -> Result<()>;

  async fn delete_issue(&self, issue_key: &str, headers: &Headers) -> Result<()>;

  async fn transition_issue(
    &self,
    issue_key: &str,
    transition_id: &str,
    comment: Option<&str>,
    headers: &Headers,
  ) -> Result<()>;

  async fn add_comment(&self, issue_key: &str, body: &str, headers: &Headers) -> Result<Comment>;

  async fn add_worklog(&self, issue_key: &str, worklog: &NewWorklog, headers: &Headers)
    -> Result<Worklog>;

  async fn assign_issue(&self, issue_key: &str, assignee: &User, headers: &Headers) -> Result<()>;

  async fn search_users(&self, query: &str, headers: &Headers) -> Result<Vec<User>>;

  async fn list_projects(&self, headers: &Headers) -> Result<Vec<Project>>;

  async fn list_versions(&self, project_key: &str, headers: &Headers) -> Result<Vec<Version>>;

  async fn create_version(&self, version: &NewVersion, headers: &Headers) -> Result<Version>;

  async fn list_boards(&self, project_key: Option<&str>, headers: &Headers) -> Result<Vec<Board>>;

  async fn get_board_issues(
    &self,
    board_id: u64,
    jql: Option<&str>,
    headers: &Headers,
  ) -> Result<SearchResult>;

  async fn get_fields(&self, headers: &Headers) -> Result<Vec<Field>>;

  async fn get_link_types(&self, headers: &Headers) -> Result<Vec<LinkType>>;

  async fn create_issue_link(&self, link: &NewIssueLink, headers: &Headers) -> Result<()>;

  async fn remove_issue_link(&self, link_id: &str, headers: &Headers) -> Result<()>;

  async fn get_server_info(&self, headers: &Headers) -> Result<ServerInfo>;
}
