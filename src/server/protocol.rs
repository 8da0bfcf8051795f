//! JSON-RPC 2.0 frames and MCP method names.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request. A request without `id` is a notification;
/// `"id": null` is a request and gets a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
  pub jsonrpc: String,
  #[serde(default, deserialize_with = "present_id")]
  pub id: Option<JsonRpcId>,
  pub method: String,
  #[serde(default)]
  pub params: Option<Value>,
}

impl JsonRpcRequest {
  pub fn is_notification(&self) -> bool {
    self.id.is_none()
  }
}

/// Only runs when `id` is present, so an explicit null stays distinct from
/// an absent field.
fn present_id<'de, D>(deserializer: D) -> Result<Option<JsonRpcId>, D::Error>
where
  D: Deserializer<'de>,
{
  JsonRpcId::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
  pub jsonrpc: String,
  pub id: Option<JsonRpcId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<JsonRpcError>,
}

/// Request id: string, number, or explicit null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcId {
  String(String),
  Number(i64),
  Null,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
  pub code: i32,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
}

impl JsonRpcResponse {
  pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
    Self {
      jsonrpc: "2.0".to_string(),
      id,
      result: Some(result),
      error: None,
    }
  }

  pub fn error(id: Option<JsonRpcId>, code: i32, message: impl Into<String>) -> Self {
    Self::from_error(
      id,
      JsonRpcError {
        code,
        message: message.into(),
        data: None,
      },
    )
  }

  pub fn from_error(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
    Self {
      jsonrpc: "2.0".to_string(),
      id,
      result: None,
      error: Some(error),
    }
  }
}

/// Standard JSON-RPC codes plus the tool error codes (-32001 to -32099).
pub mod error_codes {
  pub const PARSE_ERROR: i32 = -32700;
  pub const INVALID_REQUEST: i32 = -32600;
  pub const METHOD_NOT_FOUND: i32 = -32601;
  pub const INVALID_PARAMS: i32 = -32602;
  pub const INTERNAL_ERROR: i32 = -32603;

  pub const NOT_FOUND: i32 = -32002;
  pub const TOOL_EXECUTION: i32 = -32003;
}

pub mod methods {
  pub const INITIALIZE: &str = "initialize";
  pub const INITIALIZED: &str = "notifications/initialized";
  pub const PING: &str = "ping";
  pub const TOOLS_LIST: &str = "tools/list";
  pub const TOOLS_CALL: &str = "tools/call";
}

pub const PROTOCOL_VERSION: &str = "2024-11-05";
