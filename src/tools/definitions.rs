//! Tool definitions advertised through `tools/list`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::names;

/// MCP tool definition: a name, a description and a JSON Schema for input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
  pub name: String,
  pub description: String,
  #[serde(rename = "inputSchema")]
  pub input_schema: Value,
}

impl ToolDefinition {
  fn new(name: &str, description: &str, input_schema: Value) -> Self {
    Self {
      name: name.to_string(),
      description: description.to_string(),
      input_schema,
    }
  }
}

fn string(description: &str) -> Value {
  json!({ "type": "string", "description": description })
}

fn string_list(description: &str) -> Value {
  json!({
    "oneOf": [
      { "type": "string" },
      { "type": "array", "items": { "type": "string" } }
    ],
    "description": description
  })
}

fn object(properties: Value, required: &[&str]) -> Value {
  json!({
    "type": "object",
    "properties": properties,
    "required": required,
  })
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
  let issue_key = string("Issue key, e.g. PROJ-123");

  vec![
    ToolDefinition::new(
      names::SEARCH_ISSUES,
      "Search for issues with JQL. Results are cached briefly.",
      object(
        json!({
          "jql": string("JQL query, e.g. project = PROJ AND status = \"In Progress\""),
          "fields": string_list("Extra fields to return"),
          "max_results": { "type": "integer", "minimum": 1, "maximum": 100, "default": 50 },
          "start_at": { "type": "integer", "minimum": 0, "default": 0 }
        }),
        &["jql"],
      ),
    ),
    ToolDefinition::new(
      names::GET_ISSUE,
      "Get full details of a single issue, including its links.",
      object(
        json!({
          "issue_key": issue_key,
          "fields": string_list("Fields to return (default: all)"),
          "expand": string_list("Expansions, e.g. renderedFields or changelog")
        }),
        &["issue_key"],
      ),
    ),
    ToolDefinition::new(
      names::GET_TRANSITIONS,
      "List the workflow transitions currently available for an issue.",
      object(json!({ "issue_key": issue_key }), &["issue_key"]),
    ),
    ToolDefinition::new(
      names::LIST_PROJECTS,
      "List projects visible to the authenticated user.",
      object(json!({}), &[]),
    ),
    ToolDefinition::new(
      names::LIST_VERSIONS,
      "List the versions (releases) of a project.",
      object(json!({ "project_key": string("Project key") }), &["project_key"]),
    ),
    ToolDefinition::new(
      names::LIST_BOARDS,
      "List agile boards, optionally restricted to one project.",
      object(json!({ "project_key": string("Project key") }), &[]),
    ),
    ToolDefinition::new(
      names::GET_BOARD_ISSUES,
      "List the issues on an agile board.",
      object(
        json!({
          "board_id": { "type": "integer", "description": "Board id" },
          "jql": string("Additional JQL filter")
        }),
        &["board_id"],
      ),
    ),
    ToolDefinition::new(
      names::GET_USER,
      "Look up a user by account id, username, email or display name.",
      object(json!({ "identifier": string("Account id, username, email or display name") }), &["identifier"]),
    ),
    ToolDefinition::new(
      names::GET_FIELDS,
      "List system and custom fields.",
      object(json!({}), &[]),
    ),
    ToolDefinition::new(
      names::GET_LINK_TYPES,
      "List issue link types with their inward and outward phrases.",
      object(json!({}), &[]),
    ),
    ToolDefinition::new(
      names::GET_SERVER_INFO,
      "Get the Jira server version and deployment type.",
      object(json!({}), &[]),
    ),
    ToolDefinition::new(
      names::CREATE_ISSUE,
      "Create an issue.",
      object(
        json!({
          "project_key": string("Project key"),
          "summary": string("One-line summary"),
          "issue_type": string("Issue type name, e.g. Task or Bug"),
          "description": string("Plain-text description"),
          "labels": string_list("Labels"),
          "components": string_list("Component names"),
          "priority": string("Priority name"),
          "assignee": string("Account id, username, email or display name")
        }),
        &["project_key", "summary", "issue_type"],
      ),
    ),
    ToolDefinition::new(
      names::UPDATE_ISSUE,
      "Update fields of an issue. Omitted fields are left unchanged.",
      object(
        json!({
          "issue_key": issue_key,
          "summary": string("New summary"),
          "description": string("New plain-text description"),
          "labels": string_list("Replacement label set"),
          "priority": string("Priority name")
        }),
        &["issue_key"],
      ),
    ),
    ToolDefinition::new(
      names::DELETE_ISSUE,
      "Delete an issue.",
      object(json!({ "issue_key": issue_key }), &["issue_key"]),
    ),
    ToolDefinition::new(
      names::TRANSITION_ISSUE,
      "Move an issue through its workflow. Use jira_get_transitions to find ids.",
      object(
        json!({
          "issue_key": issue_key,
          "transition_id": string("Transition id"),
          "comment": string("Comment to add with the transition")
        }),
        &["issue_key", "transition_id"],
      ),
    ),
    ToolDefinition::new(
      names::ADD_COMMENT,
      "Add a comment to an issue.",
      object(
        json!({ "issue_key": issue_key, "body": string("Comment text") }),
        &["issue_key", "body"],
      ),
    ),
    ToolDefinition::new(
      names::ADD_WORKLOG,
      "Log time spent on an issue.",
      object(
        json!({
          "issue_key": issue_key,
          "time_spent": string("Duration in Jira notation, e.g. 1h 30m"),
          "comment": string("Worklog comment"),
          "started": string("RFC 3339 start time (default: now)")
        }),
        &["issue_key", "time_spent"],
      ),
    ),
    ToolDefinition::new(
      names::ASSIGN_ISSUE,
      "Assign an issue to a user.",
      object(
        json!({
          "issue_key": issue_key,
          "assignee": string("Account id, username, email or display name")
        }),
        &["issue_key", "assignee"],
      ),
    ),
    ToolDefinition::new(
      names::CREATE_VERSION,
      "Create a version (release) in a project.",
      object(
        json!({
          "project_key": string("Project key"),
          "name": string("Version name"),
          "description": string("Version description"),
          "release_date": string("Release date, YYYY-MM-DD")
        }),
        &["project_key", "name"],
      ),
    ),
    ToolDefinition::new(
      names::LINK_ISSUES,
      "Link two issues. The outward issue gets the link type's outward phrase.",
      object(
        json!({
          "link_type": string("Link type name, e.g. Blocks"),
          "inward_issue": string("Inward issue key"),
          "outward_issue": string("Outward issue key"),
          "comment": string("Comment to add to the outward issue")
        }),
        &["link_type", "inward_issue", "outward_issue"],
      ),
    ),
    ToolDefinition::new(
      names::REMOVE_ISSUE_LINK,
      "Remove an issue link by id.",
      object(json!({ "link_id": string("Link id") }), &["link_id"]),
    ),
  ]
}
