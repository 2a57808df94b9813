//! Shared executor and runtime status for the proxy.
//!
//! # Architecture
//!
//! ```text
//! StateStore (Clone, never fails loudly: errors become `false` / empty)
//!   └── Arc<dyn StateBackend>
//!         ├── MemoryBackend    memory://            (dashmap, typed records)
//!         ├── RedbBackend      redb:///path.redb    (embedded, JSON values)
//!         ├── RedisBackend     redis://host:port    (hash per namespace, JSON fields)
//!         ├── RedisBackend     redis-cluster://[a;b]
//!         └── CachedBackend    TTL snapshot cache in front of any of the above
//! ```
//!
//! Records live in namespaces ("resources"): every executor under
//! [`RESOURCE_EXECUTORS`], and the runtimes of executor `H` under
//! `{runtimes}H` (see [`runtimes_resource`]). A namespace maps keys to a
//! `{status, usage}` record.
//!
//! State is a placement hint, not a correctness dependency: the proxy keeps
//! serving when the backend is unreachable, so the [`StateStore`] facade
//! logs backend errors and reports plain success flags.

pub mod backend;
pub mod cached;
pub mod error;
pub mod memory;
pub mod redb_store;
pub mod redis_store;
pub mod store;
pub mod types;

pub use backend::{BoxFuture, Entries, StateBackend};
pub use cached::CachedBackend;
pub use error::{StateError, StateResult};
pub use memory::MemoryBackend;
pub use redb_store::RedbBackend;
pub use redis_store::RedisBackend;
pub use store::StateStore;
pub use types::*;
