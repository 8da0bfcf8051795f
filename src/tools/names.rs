//! Tool names as advertised in `tools/list`.

pub const SEARCH_ISSUES: &str = "jira_search_issues";
pub const GET_ISSUE: &str = "jira_get_issue";
pub const GET_TRANSITIONS: &str = "jira_get_transitions";
pub const LIST_PROJECTS: &str = "jira_list_projects";
pub const LIST_VERSIONS: &str = "jira_list_versions";
pub const LIST_BOARDS: &str = "jira_list_boards";
pub const GET_BOARD_ISSUES: &str = "jira_get_board_issues";
pub const GET_USER: &str = "jira_get_user";
pub const GET_FIELDS: &str = "jira_get_fields";
pub const GET_LINK_TYPES: &str = "jira_get_link_types";
pub const GET_SERVER_INFO: &str = "jira_get_server_info";

pub const CREATE_ISSUE: &str = "jira_create_issue";
pub const UPDATE_ISSUE: &str = "jira_update_issue";
pub const DELETE_ISSUE: &str = "jira_delete_issue";
pub const TRANSITION_ISSUE: &str = "jira_transition_issue";
pub const ADD_COMMENT: &str = "jira_add_comment";
pub const ADD_WORKLOG: &str = "jira_add_worklog";
pub const ASSIGN_ISSUE: &str = "jira_assign_issue";
pub const CREATE_VERSION: &str = "jira_create_version";
pub const LINK_ISSUES: &str = "jira_link_issues";
pub const REMOVE_ISSUE_LINK: &str = "jira_remove_issue_link";

pub const ALL: &[&str] = &[
  SEARCH_ISSUES,
  GET_ISSUE,
  GET_TRANSITIONS,
  LIST_PROJECTS,
  LIST_VERSIONS,
  LIST_BOARDS,
  GET_BOARD_ISSUES,
  GET_USER,
  GET_FIELDS,
  GET_LINK_TYPES,
  GET_SERVER_INFO,
  CREATE_ISSUE,
  UPDATE_ISSUE,
  DELETE_ISSUE,
  TRANSITION_ISSUE,
  ADD_COMMENT,
  ADD_WORKLOG,
  ASSIGN_ISSUE,
  CREATE_VERSION,
  LINK_ISSUES,
  REMOVE_ISSUE_LINK,
];
