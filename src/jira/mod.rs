pub mod api;
mod api_types;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod service;
pub mod types;

pub use api::JiraApi;
pub use client::JiraClient;
pub use service::{normalize_issue_key, IssueDraft, JiraService};
