//! The facade every other component talks to.
//!
//! Backend errors stop here: writes report `false`, reads return an empty
//! snapshot, and the failure is logged. Callers treat a `false` as "state
//! not guaranteed persisted" and keep serving.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use runproxy_core::{ConfigError, Dsn};
use tracing::{debug, warn};

use crate::backend::{Entries, StateBackend};
use crate::cached::CachedBackend;
use crate::error::StateResult;
use crate::memory::MemoryBackend;
use crate::redb_store::RedbBackend;
use crate::redis_store::{RedisBackend, parse_cluster_hosts};
use crate::types::*;

/// Cheaply cloneable handle over the configured backend.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
}

impl StateStore {
    pub fn new(backend: impl StateBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    /// Process-local store, mostly for tests and single-instance setups.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open the backend named by a connection string.
    ///
    /// | Scheme | Backend |
    /// |---|---|
    /// | `memory://` | [`MemoryBackend`] |
    /// | `redb:///path/state.redb` | [`RedbBackend`] |
    /// | `redis://host:port/db` | [`RedisBackend`] (MULTI/EXEC replace) |
    /// | `redis-cluster://[a:1;b:2]` | [`RedisBackend`] over a cluster |
    ///
    /// A non-zero `cache_ttl` puts a [`CachedBackend`] in front of the
    /// persistent backends.
    pub async fn connect(connection: &str, cache_ttl: Duration) -> StateResult<Self> {
        let dsn = Dsn::parse(connection)?;
        let backend: Arc<dyn StateBackend> = match dsn.scheme.as_str() {
            "memory" => return Ok(Self::in_memory()),
            "redb" => {
                let path = format!("{}{}", dsn.host, dsn.path);
                if path.is_empty() {
                    return Err(ConfigError::InvalidDsn(connection.to_string()).into());
                }
                Arc::new(RedbBackend::open(Path::new(&path))?)
            }
            "redis" => Arc::new(RedisBackend::connect(connection).await?),
            "redis-cluster" => {
                let nodes = parse_cluster_hosts(&dsn.host);
                if nodes.is_empty() {
                    return Err(ConfigError::InvalidDsn(connection.to_string()).into());
                }
                Arc::new(RedisBackend::connect_cluster(&nodes, dsn.password.as_deref()).await?)
            }
            other => return Err(ConfigError::UnsupportedState(other.to_string()).into()),
        };

        if cache_ttl.is_zero() {
            Ok(Self::from_arc(backend))
        } else {
            debug!(ttl = ?cache_ttl, "state cache enabled");
            Ok(Self::new(CachedBackend::new(backend, cache_ttl)))
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // ── Raw namespace operations ───────────────────────────────────

    /// Write one `{status, usage}` record.
    pub async fn upsert(&self, resource: &str, key: &str, status: &str, usage: f64) -> bool {
        let record = Record::new(status, usage);
        match self.backend.upsert(resource, key, &record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), %resource, %key, error = %e, "state write failed");
                false
            }
        }
    }

    /// Replace a namespace with exactly `entries`.
    pub async fn upsert_all(&self, resource: &str, entries: &Entries) -> bool {
        match self.backend.upsert_all(resource, entries).await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), %resource, error = %e, "state bulk write failed");
                false
            }
        }
    }

    /// Snapshot of a namespace; empty when the backend cannot be read.
    pub async fn list(&self, resource: &str) -> Entries {
        match self.backend.list(resource).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(backend = self.backend.name(), %resource, error = %e, "state read failed");
                Entries::new()
            }
        }
    }

    pub async fn remove(&self, resource: &str, key: &str) -> bool {
        match self.backend.remove(resource, key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(backend = self.backend.name(), %resource, %key, error = %e, "state remove failed");
                false
            }
        }
    }

    /// Wipe all state.
    pub async fn flush(&self) -> bool {
        match self.backend.flush().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "state flush failed");
                false
            }
        }
    }

    // ── Executors ──────────────────────────────────────────────────

    pub async fn save_executor(&self, hostname: &str, status: ExecutorStatus, usage: f64) -> bool {
        self.upsert(RESOURCE_EXECUTORS, hostname, status.as_str(), usage)
            .await
    }

    /// Executors keyed by hostname, without their runtimes.
    pub async fn list_executors(&self) -> BTreeMap<String, ExecutorRecord> {
        self.list(RESOURCE_EXECUTORS)
            .await
            .into_iter()
            .map(|(hostname, record)| {
                let executor = ExecutorRecord {
                    hostname: hostname.clone(),
                    status: ExecutorStatus::parse(&record.status),
                    usage: record.usage,
                    runtimes: BTreeMap::new(),
                };
                (hostname, executor)
            })
            .collect()
    }

    // ── Runtimes ───────────────────────────────────────────────────

    pub async fn save_runtime(
        &self,
        hostname: &str,
        runtime_id: &str,
        status: RuntimeStatus,
        usage: f64,
    ) -> bool {
        self.upsert(&runtimes_resource(hostname), runtime_id, status.as_str(), usage)
            .await
    }

    /// Replace the runtime set of an executor with exactly `runtimes`.
    pub async fn replace_runtimes(
        &self,
        hostname: &str,
        runtimes: &BTreeMap<String, RuntimeRecord>,
    ) -> bool {
        let entries: Entries = runtimes
            .iter()
            .map(|(id, runtime)| (id.clone(), Record::from(*runtime)))
            .collect();
        self.upsert_all(&runtimes_resource(hostname), &entries).await
    }

    /// Forget every runtime of an executor.
    pub async fn clear_runtimes(&self, hostname: &str) -> bool {
        self.upsert_all(&runtimes_resource(hostname), &Entries::new())
            .await
    }

    pub async fn list_runtimes(&self, hostname: &str) -> BTreeMap<String, RuntimeRecord> {
        self.list(&runtimes_resource(hostname))
            .await
            .iter()
            .map(|(id, record)| (id.clone(), RuntimeRecord::from(record)))
            .collect()
    }

    /// Every executor joined with its runtimes, ordered by hostname.
    pub async fn snapshot(&self) -> Vec<ExecutorRecord> {
        let executors = self.list_executors().await;
        let mut snapshot = Vec::with_capacity(executors.len());
        for (hostname, mut executor) in executors {
            executor.runtimes = self.list_runtimes(&hostname).await;
            snapshot.push(executor);
        }
        snapshot
    }
}
