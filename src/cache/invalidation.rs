//! Post-mutation cache invalidation.
//!
//! Rules are substring matches over live keys: a sweep deletes every key that
//! contains the mutated resource's identifier or one of the aggregate tags.
//! Over-deletion is fine; missing a stale entry is not.

use tracing::{debug, error, warn};

use super::layer::CacheLayer;

pub const SEARCH_TAG: &str = "jira:search";
pub const PROJECTS_TAG: &str = "jira:projects";
pub const VERSIONS_TAG: &str = "jira:versions";
pub const BOARD_ISSUES_TAG: &str = "jira:board_issues";

/// Views that aggregate issue state and go stale when any issue changes.
const ISSUE_AGGREGATES: &[&str] = &[SEARCH_TAG, PROJECTS_TAG, BOARD_ISSUES_TAG];

/// What a successful mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation<'a> {
  /// An issue was created, updated, deleted, transitioned, assigned,
  /// commented on, or had work logged.
  Issue(&'a str),
  /// A link was created between two issues.
  IssueLink { inward: &'a str, outward: &'a str },
  /// A member was added to a collection such as a project's versions.
  Collection(&'a str),
  /// A link was removed. Only its id is known, so only searches are swept.
  LinkRemoved,
}

impl Invalidation<'_> {
  /// Substrings whose matching keys must be dropped.
  pub fn patterns(&self) -> Vec<&str> {
    match *self {
      Self::Issue(key) => std::iter::once(key)
        .chain(ISSUE_AGGREGATES.iter().copied())
        .collect(),
      Self::IssueLink { inward, outward } => vec![inward, outward, SEARCH_TAG],
      Self::Collection(tag) => vec![tag],
      Self::LinkRemoved => vec![SEARCH_TAG],
    }
  }
}

impl CacheLayer {
  /// Apply an invalidation rule. Call only after the remote write succeeded.
  pub fn invalidate(&self, rule: Invalidation<'_>) -> usize {
    self.invalidate_matching(&rule.patterns())
  }

  /// Delete every key containing any of `patterns` (case-insensitive).
  /// Blank patterns are ignored. Returns the number of keys deleted.
  ///
  /// If the key scan fails the whole store is cleared instead, and the
  /// count is unknown so 0 is returned.
  pub fn invalidate_matching(&self, patterns: &[&str]) -> usize {
    let needles: Vec<String> = patterns
      .iter()
      .map(|p| p.trim().to_lowercase())
      .filter(|p| !p.is_empty())
      .collect();
    if needles.is_empty() {
      return 0;
    }

    let keys = match self.storage().keys() {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "Failed to list cache keys for invalidation, clearing cache");
        if let Err(e) = self.storage().clear() {
          error!(error = %e, "Failed to clear cache, stale entries may survive until their TTL");
        }
        return 0;
      }
    };

    let mut deleted = 0;
    for key in keys {
      let haystack = key.to_lowercase();
      if needles.iter().any(|n| haystack.contains(n.as_str())) {
        self.delete(&key);
        deleted += 1;
      }
    }

    debug!(?needles, deleted, "cache invalidated");
    deleted
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::{CacheStorage, MemoryStorage};
  use color_eyre::{eyre::eyre, Result};
  use serde_json::Value;
  use std::sync::Arc;
  use std::time::Duration;

  const TTL: Duration = Duration::from_secs(300);

  fn seeded(keys: &[&str]) -> CacheLayer {
    let cache = CacheLayer::new(MemoryStorage::new());
    for key in keys {
      cache.set(key, &1, TTL);
    }
    cache
  }

  fn remaining(cache: &CacheLayer) -> Vec<String> {
    let mut keys = cache.storage().keys().unwrap();
    keys.sort();
    keys
  }

  #[test]
  fn test_issue_sweep_spares_unrelated_keys() {
    let cache = seeded(&[
      r#"jira:issue:{"issue_key":"ISSUE-1"}"#,
      "jira:search:X",
      "jira:projects:Y",
      "jira:user:Z",
    ]);

    let deleted = cache.invalidate_matching(&["ISSUE-1", SEARCH_TAG, PROJECTS_TAG]);

    assert_eq!(deleted, 3);
    assert_eq!(remaining(&cache), vec!["jira:user:Z"]);
  }

  #[test]
  fn test_issue_rule_covers_board_listings() {
    let cache = seeded(&[
      r#"jira:transitions:{"issue_key":"PROJ-2"}"#,
      r#"jira:board_issues:{"board_id":3}"#,
      r#"jira:versions:{"project_key":"PROJ"}"#,
    ]);

    cache.invalidate(Invalidation::Issue("PROJ-2"));

    assert_eq!(remaining(&cache), vec![r#"jira:versions:{"project_key":"PROJ"}"#]);
  }

  #[test]
  fn test_match_is_case_insensitive() {
    let cache = seeded(&[r#"jira:issue:{"issue_key":"proj-9"}"#]);
    cache.invalidate(Invalidation::Issue("PROJ-9"));
    assert!(remaining(&cache).is_empty());
  }

  #[test]
  fn test_collection_rule_only_touches_its_tag() {
    let cache = seeded(&[
      r#"jira:versions:{"project_key":"PROJ"}"#,
      r#"jira:search:{"jql":"project = PROJ"}"#,
    ]);

    cache.invalidate(Invalidation::Collection(VERSIONS_TAG));

    assert_eq!(remaining(&cache), vec![r#"jira:search:{"jql":"project = PROJ"}"#]);
  }

  #[test]
  fn test_link_removal_only_sweeps_searches() {
    let cache = seeded(&[
      r#"jira:issue:{"issue_key":"PROJ-1"}"#,
      r#"jira:search:{"jql":"issue in linkedIssues(PROJ-1)"}"#,
    ]);

    cache.invalidate(Invalidation::LinkRemoved);

    assert_eq!(remaining(&cache), vec![r#"jira:issue:{"issue_key":"PROJ-1"}"#]);
  }

  #[test]
  fn test_blank_patterns_delete_nothing() {
    let cache = seeded(&["jira:issue:a", "jira:issue:b"]);
    assert_eq!(cache.invalidate_matching(&["", "  "]), 0);
    assert_eq!(remaining(&cache).len(), 2);
  }

  /// Memory storage whose key scan always fails.
  struct UnlistableStorage(Arc<MemoryStorage>);

  impl CacheStorage for UnlistableStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
      self.0.get(key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
      self.0.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
      self.0.delete(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
      Err(eyre!("disk I/O error"))
    }

    fn clear(&self) -> Result<()> {
      self.0.clear()
    }
  }

  #[test]
  fn test_failed_key_scan_clears_everything() {
    let inner = Arc::new(MemoryStorage::new());
    let cache = CacheLayer::new(UnlistableStorage(inner.clone()));
    cache.set(r#"jira:issue:{"issue_key":"PROJ-1"}"#, &1, TTL);
    cache.set("jira:search:X", &2, TTL);
    cache.set("jira:user:Z", &3, TTL);

    cache.invalidate(Invalidation::Issue("PROJ-1"));

    assert!(inner.keys().unwrap().is_empty());
    assert_eq!(cache.get::<i32>("jira:search:X"), None);
  }
}
