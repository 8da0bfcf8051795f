//! Newline-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! stdout carries protocol frames only; logs go to stderr.

use color_eyre::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::jira::types::Headers;
use crate::tools::{tool_definitions, ToolCall, ToolDispatcher};

use super::protocol::{
  error_codes, methods, JsonRpcId, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};

const SERVER_NAME: &str = "jira-mcp";

/// `tools/call` params.
#[derive(Debug, Deserialize)]
struct CallParams {
  name: String,
  #[serde(default)]
  arguments: Value,
  #[serde(default)]
  headers: Headers,
  #[serde(default, rename = "_meta")]
  meta: Option<CallMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct CallMeta {
  #[serde(default)]
  headers: Headers,
}

impl CallParams {
  /// Top-level headers win over `_meta.headers` on conflict.
  fn into_call(self) -> ToolCall {
    let mut headers = self.meta.map(|m| m.headers).unwrap_or_default();
    headers.extend(self.headers);
    ToolCall {
      name: self.name,
      arguments: self.arguments,
      headers,
    }
  }
}

pub struct McpServer {
  dispatcher: ToolDispatcher,
}

impl McpServer {
  pub fn new(dispatcher: ToolDispatcher) -> Self {
    Self { dispatcher }
  }

  /// Serve until stdin closes. Each request runs on its own task so a slow
  /// remote call does not hold up the others.
  pub async fn run(self) -> Result<()> {
    let server = Arc::new(self);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
      let mut stdout = tokio::io::stdout();
      while let Some(frame) = rx.recv().await {
        let mut bytes = frame.into_bytes();
        bytes.push(b'\n');
        if let Err(e) = stdout.write_all(&bytes).await {
          warn!(error = %e, "Failed to write response");
          break;
        }
        if let Err(e) = stdout.flush().await {
          warn!(error = %e, "Failed to flush stdout");
          break;
        }
      }
    });

    info!(version = env!("CARGO_PKG_VERSION"), "stdio server started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
      let line = line.trim().to_string();
      if line.is_empty() {
        continue;
      }

      let server = Arc::clone(&server);
      let tx = tx.clone();
      tokio::spawn(async move {
        if let Some(frame) = server.handle_message(&line).await {
          let _ = tx.send(frame);
        }
      });
    }

    // In-flight tasks hold their own senders; the writer drains until they finish.
    drop(tx);
    let _ = writer.await;
    info!("stdio server stopped");
    Ok(())
  }

  /// Handle one frame. Returns the serialized response, or `None` for notifications.
  pub async fn handle_message(&self, line: &str) -> Option<String> {
    let response = match serde_json::from_str::<Value>(line) {
      Err(e) => Some(JsonRpcResponse::error(
        None,
        error_codes::PARSE_ERROR,
        format!("Parse error: {}", e),
      )),
      Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
        Err(e) => Some(JsonRpcResponse::error(
          None,
          error_codes::INVALID_REQUEST,
          format!("Invalid request: {}", e),
        )),
        Ok(request) => self.handle_request(request).await,
      },
    }?;

    match serde_json::to_string(&response) {
      Ok(frame) => Some(frame),
      Err(e) => {
        warn!(error = %e, "Failed to serialize response");
        None
      }
    }
  }

  async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    if request.is_notification() {
      debug!(method = %request.method, "notification");
      return None;
    }

    let id = request.id.clone();
    let response = match request.method.as_str() {
      methods::INITIALIZE => JsonRpcResponse::success(id, initialize_result()),
      methods::PING => JsonRpcResponse::success(id, json!({})),
      methods::TOOLS_LIST => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
      methods::TOOLS_CALL => self.handle_tools_call(id, request.params).await,
      other => JsonRpcResponse::error(
        id,
        error_codes::METHOD_NOT_FOUND,
        format!("Method not found: {}", other),
      ),
    };
    Some(response)
  }

  async fn handle_tools_call(&self, id: Option<JsonRpcId>, params: Option<Value>) -> JsonRpcResponse {
    let params = match serde_json::from_value::<CallParams>(params.unwrap_or(Value::Null)) {
      Ok(p) => p,
      Err(e) => {
        return JsonRpcResponse::error(
          id,
          error_codes::INVALID_PARAMS,
          format!("Invalid tools/call params: {}", e),
        )
      }
    };

    match self.dispatcher.execute(params.into_call()).await {
      Ok(output) => match serde_json::to_value(&output) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::from_error(id, ToolError::Unexpected(e.to_string()).to_rpc_error()),
      },
      Err(e) => JsonRpcResponse::from_error(id, e.to_rpc_error()),
    }
  }
}

fn initialize_result() -> Value {
  json!({
    "protocolVersion": PROTOCOL_VERSION,
    "capabilities": {
      "tools": {}
    },
    "serverInfo": {
      "name": SERVER_NAME,
      "version": env!("CARGO_PKG_VERSION")
    }
  })
}
