//! Tool error taxonomy and the normalizer that classifies failures.
//!
//! Domain code raises a [`ToolError`] inside an `eyre::Report` at the point
//! where it knows exactly what went wrong (a missing field, an unknown user).
//! Everything else (HTTP failures, bad response bodies) travels as a plain
//! report and is classified here when it crosses the dispatch boundary.

use color_eyre::eyre::Report;
use serde_json::{json, Value};
use std::future::Future;

use crate::server::protocol::{error_codes, JsonRpcError};

/// Closed set of errors reported back to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
  /// A required lookup matched nothing.
  #[error("{resource} not found: {identifier}")]
  NotFound {
    resource: String,
    identifier: String,
  },

  /// Caller input was missing or malformed. Raised before any network call.
  #[error("Validation error: {0}")]
  Validation(String),

  /// The remote call or the tool itself failed.
  #[error("Error executing tool {tool}: {message}")]
  ToolExecution { tool: String, message: String },

  #[error("Unexpected error: {0}")]
  Unexpected(String),
}

impl ToolError {
  pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
    Self::NotFound {
      resource: resource.into(),
      identifier: identifier.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
    Self::ToolExecution {
      tool: tool.into(),
      message: message.into(),
    }
  }

  /// Stable label used in logs and in the error object's `data.kind`.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::NotFound { .. } => "NotFound",
      Self::Validation(_) => "Validation",
      Self::ToolExecution { .. } => "ToolExecution",
      Self::Unexpected(_) => "Unexpected",
    }
  }

  /// Whether the caller can fix the problem by changing its input.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::NotFound { .. } | Self::Validation(_))
  }

  fn code(&self) -> i32 {
    match self {
      Self::NotFound { .. } => error_codes::NOT_FOUND,
      Self::Validation(_) => error_codes::INVALID_PARAMS,
      Self::ToolExecution { .. } => error_codes::TOOL_EXECUTION,
      Self::Unexpected(_) => error_codes::INTERNAL_ERROR,
    }
  }

  /// Structured JSON-RPC error object for this failure.
  pub fn to_rpc_error(&self) -> JsonRpcError {
    let mut data = json!({ "kind": self.kind() });
    match self {
      Self::NotFound {
        resource,
        identifier,
      } => {
        data["resource"] = Value::String(resource.clone());
        data["identifier"] = Value::String(identifier.clone());
      }
      Self::ToolExecution { tool, .. } => {
        data["tool"] = Value::String(tool.clone());
      }
      Self::Validation(_) | Self::Unexpected(_) => {}
    }

    JsonRpcError {
      code: self.code(),
      message: self.to_string(),
      data: Some(data),
    }
  }
}

/// Classify a report that escaped a tool handler.
///
/// Typed errors raised deeper down are returned as-is; the dispatcher never
/// re-classifies them. Untyped failures keep their full message chain.
pub fn classify(tool: &str, report: Report) -> ToolError {
  match report.downcast::<ToolError>() {
    Ok(typed) => typed,
    Err(report) => ToolError::execution(tool, format!("{:#}", report)),
  }
}

/// Run `operation` and normalize whatever it fails with.
///
/// No retries: a single attempt either succeeds or is reported.
pub async fn with_error_handling<T, Fut>(tool: &str, operation: Fut) -> Result<T, ToolError>
where
  Fut: Future<Output = color_eyre::Result<T>>,
{
  operation.await.map_err(|e| classify(tool, e))
}

/// Shorthand for a required string field that must be present and non-blank.
pub fn require<'a>(value: Option<&'a str>, field: &str) -> color_eyre::Result<&'a str> {
  match value.map(str::trim) {
    Some(v) if !v.is_empty() => Ok(v),
    _ => Err(ToolError::validation(format!("{} is required", field)).into()),
  }
}
