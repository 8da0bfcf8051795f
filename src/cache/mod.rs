//! Request-level cache between the tool layer and the Jira REST API.
//!
//! - `storage`: the key/value store with per-entry expiry (memory, SQLite, or disabled)
//! - `key`: deterministic `namespace:operation:params` keys
//! - `layer`: get-or-populate facade with optional single-flight
//! - `invalidation`: substring sweeps after successful writes

mod invalidation;
mod key;
mod layer;
mod storage;

pub use invalidation::{Invalidation, VERSIONS_TAG};
pub use key::{generate_key, NAMESPACE};
pub use layer::CacheLayer;
pub use storage::{MemoryStorage, NoopStorage, SqliteStorage};
