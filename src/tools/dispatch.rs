//! Routes `tools/call` requests to Jira operations and shapes their results.

use color_eyre::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{with_error_handling, ToolError};
use crate::jira::types::{Headers, IssueRequest, IssueUpdate, SearchRequest, DEFAULT_MAX_RESULTS};
use crate::jira::{normalize_issue_key, IssueDraft, JiraService};

use super::args::{self, parse};
use super::names;
use super::render;

const MAX_PAGE_SIZE: u32 = 100;

/// One tool invocation as received from the protocol layer.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
  pub name: String,
  pub arguments: Value,
  /// Forwarded to Jira on every remote call this invocation makes.
  pub headers: Headers,
}

/// A typed content block of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
  Text { text: String },
}

/// The `{ content: [...] }` envelope returned for a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
  pub content: Vec<ContentBlock>,
}

impl ToolOutput {
  pub fn text(text: impl Into<String>) -> Self {
    Self {
      content: vec![ContentBlock::Text { text: text.into() }],
    }
  }
}

#[derive(Clone)]
pub struct ToolDispatcher {
  service: JiraService,
}

impl ToolDispatcher {
  pub fn new(service: JiraService) -> Self {
    Self { service }
  }

  /// Execute one tool call. Failures come back classified, never as a panic,
  /// and leave the dispatcher usable for the next call.
  pub async fn execute(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
    let started = Instant::now();
    let ToolCall {
      name,
      arguments,
      headers,
    } = call;

    let result = with_error_handling(&name, self.route(&name, arguments, &headers)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
      Ok(_) => info!(tool = %name, elapsed_ms, "tool call succeeded"),
      Err(e) if e.is_recoverable() => {
        info!(tool = %name, kind = e.kind(), elapsed_ms, error = %e, "tool call rejected")
      }
      Err(e) => warn!(tool = %name, kind = e.kind(), elapsed_ms, error = %e, "tool call failed"),
    }

    result.map(ToolOutput::text)
  }

  async fn route(&self, name: &str, arguments: Value, headers: &Headers) -> Result<String> {
    let service = &self.service;

    match name {
      names::SEARCH_ISSUES => {
        let args: args::SearchIssuesArgs = parse(arguments)?;
        let request = SearchRequest {
          jql: args.jql.trim().to_string(),
          fields: args.fields,
          max_results: args
            .max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_PAGE_SIZE),
          start_at: args.start_at.unwrap_or(0),
        };
        let result = service.search_issues(request, headers).await?;
        Ok(render::search_result(&result))
      }
      names::GET_ISSUE => {
        let args: args::GetIssueArgs = parse(arguments)?;
        let request = IssueRequest {
          issue_key: args.issue_key,
          fields: args.fields,
          expand: args.expand,
        };
        let issue = service.get_issue(request, headers).await?;
        Ok(render::issue(&issue))
      }
      names::GET_TRANSITIONS => {
        let args: args::IssueKeyArgs = parse(arguments)?;
        let transitions = service.get_transitions(&args.issue_key, headers).await?;
        Ok(render::json(&transitions))
      }
      names::LIST_PROJECTS => {
        let projects = service.list_projects(headers).await?;
        Ok(render::json(&projects))
      }
      names::LIST_VERSIONS => {
        let args: args::ProjectArgs = parse(arguments)?;
        let versions = service.list_versions(&args.project_key, headers).await?;
        Ok(render::json(&versions))
      }
      names::LIST_BOARDS => {
        let args: args::ListBoardsArgs = parse(arguments)?;
        let boards = service.list_boards(args.project_key.as_deref(), headers).await?;
        Ok(render::json(&boards))
      }
      names::GET_BOARD_ISSUES => {
        let args: args::BoardIssuesArgs = parse(arguments)?;
        let result = service
          .get_board_issues(args.board_id, args.jql.as_deref(), headers)
          .await?;
        Ok(render::search_result(&result))
      }
      names::GET_USER => {
        let args: args::GetUserArgs = parse(arguments)?;
        let user = service.resolve_user(&args.identifier, headers).await?;
        Ok(render::json(&user))
      }
      names::GET_FIELDS => {
        let fields = service.get_fields(headers).await?;
        Ok(render::json(&fields))
      }
      names::GET_LINK_TYPES => {
        let link_types = service.get_link_types(headers).await?;
        Ok(render::json(&link_types))
      }
      names::GET_SERVER_INFO => {
        let info = service.get_server_info(headers).await?;
        Ok(render::json(&info))
      }

      names::CREATE_ISSUE => {
        let args: args::CreateIssueArgs = parse(arguments)?;
        let draft = IssueDraft {
          project_key: args.project_key,
          summary: args.summary,
          issue_type: args.issue_type,
          description: args.description,
          labels: args.labels,
          components: args.components,
          priority: args.priority,
          assignee: args.assignee,
        };
        let created = service.create_issue(draft, headers).await?;
        Ok(render::json(&created))
      }
      names::UPDATE_ISSUE => {
        let args: args::UpdateIssueArgs = parse(arguments)?;
        let update = IssueUpdate {
          summary: args.summary,
          description: args.description,
          labels: args.labels,
          priority: args.priority,
        };
        service.update_issue(&args.issue_key, update, headers).await?;
        Ok(status("updated", &args.issue_key))
      }
      names::DELETE_ISSUE => {
        let args: args::IssueKeyArgs = parse(arguments)?;
        service.delete_issue(&args.issue_key, headers).await?;
        Ok(status("deleted", &args.issue_key))
      }
      names::TRANSITION_ISSUE => {
        let args: args::TransitionIssueArgs = parse(arguments)?;
        service
          .transition_issue(
            &args.issue_key,
            &args.transition_id,
            args.comment.as_deref(),
            headers,
          )
          .await?;
        Ok(status("transitioned", &args.issue_key))
      }
      names::ADD_COMMENT => {
        let args: args::AddCommentArgs = parse(arguments)?;
        let comment = service.add_comment(&args.issue_key, &args.body, headers).await?;
        Ok(render::json(&comment))
      }
      names::ADD_WORKLOG => {
        let args: args::AddWorklogArgs = parse(arguments)?;
        let worklog = service
          .add_worklog(
            &args.issue_key,
            &args.time_spent,
            args.comment,
            args.started.as_deref(),
            headers,
          )
          .await?;
        Ok(render::json(&worklog))
      }
      names::ASSIGN_ISSUE => {
        let args: args::AssignIssueArgs = parse(arguments)?;
        let user = service.assign_issue(&args.issue_key, &args.assignee, headers).await?;
        Ok(render::json(&json!({
          "issue_key": normalize_issue_key(&args.issue_key),
          "assignee": user,
        })))
      }
      names::CREATE_VERSION => {
        let args: args::CreateVersionArgs = parse(arguments)?;
        let version = service
          .create_version(
            &args.project_key,
            &args.name,
            args.description,
            args.release_date.as_deref(),
            headers,
          )
          .await?;
        Ok(render::json(&version))
      }
      names::LINK_ISSUES => {
        let args: args::LinkIssuesArgs = parse(arguments)?;
        service
          .link_issues(
            &args.link_type,
            &args.inward_issue,
            &args.outward_issue,
            args.comment,
            headers,
          )
          .await?;
        Ok(render::json(&json!({
          "linked": true,
          "link_type": args.link_type.trim(),
          "inward_issue": normalize_issue_key(&args.inward_issue),
          "outward_issue": normalize_issue_key(&args.outward_issue),
        })))
      }
      names::REMOVE_ISSUE_LINK => {
        let args: args::RemoveLinkArgs = parse(arguments)?;
        service.remove_issue_link(&args.link_id, headers).await?;
        Ok(render::json(&json!({ "removed": true, "link_id": args.link_id.trim() })))
      }

      unknown => Err(ToolError::execution(unknown, "Unknown tool").into()),
    }
  }
}

fn status(action: &str, issue_key: &str) -> String {
  let mut body = json!({ "issue_key": normalize_issue_key(issue_key) });
  body[action] = Value::Bool(true);
  render::json(&body)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, MemoryStorage};
  use crate::config::TtlConfig;
  use crate::jira::fake::FakeJira;
  use crate::tools::definitions::tool_definitions;
  use std::sync::Arc;

  fn dispatcher() -> (ToolDispatcher, Arc<FakeJira>) {
    let fake = Arc::new(FakeJira::with_sample_data());
    let cache = CacheLayer::new(MemoryStorage::new());
    let service = JiraService::new(fake.clone(), cache, TtlConfig::default());
    (ToolDispatcher::new(service), fake)
  }

  fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
      name: name.to_string(),
      arguments,
      headers: Headers::new(),
    }
  }

  fn text(output: &ToolOutput) -> &str {
    match &output.content[0] {
      ContentBlock::Text { text } => text,
    }
  }

  #[tokio::test]
  async fn test_output_envelope_shape() {
    let (dispatcher, _) = dispatcher();
    let output = dispatcher
      .execute(call(names::LIST_PROJECTS, json!({})))
      .await
      .unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["content"][0]["type"], "text");
    assert!(json["content"][0]["text"].as_str().unwrap().contains("PROJ"));
  }

  #[tokio::test]
  async fn test_create_then_search_reflects_new_issue() {
    let (dispatcher, _) = dispatcher();
    let search = || call(names::SEARCH_ISSUES, json!({ "jql": "project = PROJ" }));

    let before = dispatcher.execute(search()).await.unwrap();
    assert!(!text(&before).contains("PROJ-3"));

    dispatcher
      .execute(call(
        names::CREATE_ISSUE,
        json!({ "project_key": "PROJ", "summary": "Brand new", "issue_type": "Task" }),
      ))
      .await
      .unwrap();

    let after = dispatcher.execute(search()).await.unwrap();
    assert!(text(&after).contains("PROJ-3 [To Do] Brand new"));
  }

  #[tokio::test]
  async fn test_missing_summary_fails_before_network() {
    let (dispatcher, fake) = dispatcher();

    let err = dispatcher
      .execute(call(
        names::CREATE_ISSUE,
        json!({ "project_key": "PROJ", "issue_type": "Task" }),
      ))
      .await
      .unwrap_err();

    assert_eq!(err, ToolError::validation("summary is required"));
    assert_eq!(fake.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_scalar_label_is_coerced() {
    let (dispatcher, _) = dispatcher();

    dispatcher
      .execute(call(
        names::CREATE_ISSUE,
        json!({ "project_key": "PROJ", "summary": "Tagged", "issue_type": "Bug", "labels": "bug" }),
      ))
      .await
      .unwrap();

    let issue = dispatcher
      .execute(call(names::GET_ISSUE, json!({ "issue_key": "proj-3" })))
      .await
      .unwrap();
    assert!(text(&issue).contains("Labels: bug"));
  }

  #[tokio::test]
  async fn test_requested_fields_and_expand_reach_output() {
    let (dispatcher, _) = dispatcher();
    dispatcher
      .execute(call(
        names::CREATE_ISSUE,
        json!({ "project_key": "PROJ", "summary": "Tagged", "issue_type": "Bug", "labels": ["bug"] }),
      ))
      .await
      .unwrap();

    let plain = dispatcher
      .execute(call(names::SEARCH_ISSUES, json!({ "jql": "project = PROJ" })))
      .await
      .unwrap();
    let labelled = dispatcher
      .execute(call(
        names::SEARCH_ISSUES,
        json!({ "jql": "project = PROJ", "fields": "labels" }),
      ))
      .await
      .unwrap();
    assert!(!text(&plain).contains("labels:"));
    assert!(text(&labelled).contains("PROJ-3 [To Do] Tagged (Bug)\n  labels: [\"bug\"]"));

    let detail = dispatcher
      .execute(call(
        names::GET_ISSUE,
        json!({ "issue_key": "PROJ-3", "expand": ["changelog"] }),
      ))
      .await
      .unwrap();
    assert!(text(&detail).contains("\nchangelog:\n"));
  }

  #[tokio::test]
  async fn test_unknown_tool() {
    let (dispatcher, _) = dispatcher();
    let err = dispatcher.execute(call("jira_frobnicate", json!({}))).await.unwrap_err();
    assert_eq!(err, ToolError::execution("jira_frobnicate", "Unknown tool"));
  }

  #[tokio::test]
  async fn test_remote_failure_is_tool_execution() {
    let (dispatcher, fake) = dispatcher();
    fake.fail_next("get_issue");

    let err = dispatcher
      .execute(call(names::GET_ISSUE, json!({ "issue_key": "PROJ-1" })))
      .await
      .unwrap_err();
    match err {
      ToolError::ToolExecution { tool, message } => {
        assert_eq!(tool, names::GET_ISSUE);
        assert!(message.contains("503"));
      }
      other => panic!("unexpected error: {:?}", other),
    }

    // The failure was not cached and did not poison the dispatcher.
    assert!(dispatcher
      .execute(call(names::GET_ISSUE, json!({ "issue_key": "PROJ-1" })))
      .await
      .is_ok());
  }

  #[tokio::test]
  async fn test_headers_reach_remote() {
    let (dispatcher, fake) = dispatcher();
    let mut request = call(names::GET_SERVER_INFO, json!({}));
    request.headers.insert("X-Trace".into(), "t-1".into());

    dispatcher.execute(request).await.unwrap();

    let seen = fake.last_headers().unwrap();
    assert_eq!(seen.get("X-Trace").map(String::as_str), Some("t-1"));
  }

  #[tokio::test]
  async fn test_unknown_assignee_is_not_found() {
    let (dispatcher, fake) = dispatcher();
    let err = dispatcher
      .execute(call(
        names::ASSIGN_ISSUE,
        json!({ "issue_key": "PROJ-1", "assignee": "ghost@example.com" }),
      ))
      .await
      .unwrap_err();
    assert_eq!(err, ToolError::not_found("user", "ghost@example.com"));
    assert_eq!(fake.calls("assign_issue"), 0);
  }

  #[tokio::test]
  async fn test_every_defined_tool_is_routed() {
    let (dispatcher, _) = dispatcher();
    for def in tool_definitions() {
      let result = dispatcher.execute(call(&def.name, json!({}))).await;
      if let Err(ToolError::ToolExecution { message, .. }) = &result {
        assert_ne!(message, "Unknown tool", "{} is not routed", def.name);
      }
    }
  }
}
