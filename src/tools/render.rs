//! Human-readable text for tool results.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::jira::types::{Issue, IssueSummary, SearchResult};

/// Pretty-printed JSON for payloads without a dedicated text form.
pub fn json<T: Serialize + ?Sized>(value: &T) -> String {
  serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unrenderable result: {}>", e))
}

fn summary_line(issue: &IssueSummary) -> String {
  let mut line = format!(
    "{} [{}] {} ({})",
    issue.key, issue.status, issue.summary, issue.issue_type
  );
  if let Some(assignee) = &issue.assignee {
    let _ = write!(line, " - {}", assignee);
  }
  line
}

/// Strings as-is, anything else as compact JSON.
fn value_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn extra_lines(out: &mut String, extra: &BTreeMap<String, Value>, indent: &str) {
  for (name, value) in extra {
    let _ = write!(out, "\n{}{}: {}", indent, name, value_text(value));
  }
}

pub fn search_result(result: &SearchResult) -> String {
  if result.issues.is_empty() {
    return format!("No issues found (total: {})", result.total);
  }

  let first = result.start_at + 1;
  let last = result.start_at + result.issues.len() as u64;
  let mut out = format!("Issues {}-{} of {}\n", first, last, result.total);
  for issue in &result.issues {
    out.push('\n');
    out.push_str(&summary_line(issue));
    extra_lines(&mut out, &issue.extra, "  ");
  }
  out
}

pub fn issue(issue: &Issue) -> String {
  let mut out = format!("{}: {}\n", issue.key, issue.summary);
  let _ = writeln!(out, "Type: {}", issue.issue_type);
  let _ = writeln!(out, "Status: {}", issue.status);
  let _ = writeln!(out, "Priority: {}", issue.priority.as_deref().unwrap_or("-"));
  let _ = writeln!(out, "Assignee: {}", issue.assignee.as_deref().unwrap_or("Unassigned"));
  let _ = writeln!(out, "Reporter: {}", issue.reporter.as_deref().unwrap_or("-"));
  if !issue.labels.is_empty() {
    let _ = writeln!(out, "Labels: {}", issue.labels.join(", "));
  }
  if !issue.components.is_empty() {
    let _ = writeln!(out, "Components: {}", issue.components.join(", "));
  }
  let _ = writeln!(out, "Created: {}", issue.created);
  let _ = write!(out, "Updated: {}", issue.updated);
  extra_lines(&mut out, &issue.extra, "");
  out.push('\n');

  if !issue.links.is_empty() {
    out.push_str("\nLinks:\n");
    for link in &issue.links {
      let _ = writeln!(out, "  {} {} (link {})", link.relation, link.issue_key, link.id);
    }
  }

  if let Some(description) = issue.description.as_deref().filter(|d| !d.trim().is_empty()) {
    out.push_str("\nDescription:\n");
    out.push_str(description);
    out.push('\n');
  }

  for (name, value) in &issue.expanded {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let _ = write!(out, "\n{}:\n{}\n", name, body);
  }

  out.trim_end().to_string()
}
