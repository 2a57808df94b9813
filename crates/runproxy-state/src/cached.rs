//! TTL snapshot cache in front of a (usually remote) backend.
//!
//! Namespace snapshots are served from memory until they age past the TTL.
//! Writes go to the inner backend first; only when they succeed is the
//! cached snapshot patched, so the cache never holds data the inner
//! backend rejected. A `list` that raced a write does not cache its
//! possibly older result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::backend::{BoxFuture, Entries, StateBackend};
use crate::error::StateResult;
use crate::types::Record;

struct Snapshot {
    fetched_at: Instant,
    entries: Entries,
}

/// Caches `list` results per namespace for `ttl`.
pub struct CachedBackend {
    inner: Arc<dyn StateBackend>,
    cache: DashMap<String, Snapshot>,
    /// Per-namespace count of successful writes.
    writes: DashMap<String, u64>,
    flushes: AtomicU64,
    ttl: Duration,
}

/// Write counters observed when a `list` went to the inner backend.
#[derive(PartialEq, Eq)]
struct Generation {
    writes: u64,
    flushes: u64,
}

impl CachedBackend {
    pub fn new(inner: Arc<dyn StateBackend>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            writes: DashMap::new(),
            flushes: AtomicU64::new(0),
            ttl,
        }
    }

    fn fresh(&self, resource: &str) -> Option<Entries> {
        let snapshot = self.cache.get(resource)?;
        if snapshot.fetched_at.elapsed() < self.ttl {
            Some(snapshot.entries.clone())
        } else {
            None
        }
    }

    fn generation(&self, resource: &str) -> Generation {
        Generation {
            writes: self.writes.get(resource).map(|w| *w).unwrap_or(0),
            flushes: self.flushes.load(Ordering::SeqCst),
        }
    }

    /// Must run before the cached snapshot is patched.
    fn mark_written(&self, resource: &str) {
        *self.writes.entry(resource.to_string()).or_insert(0) += 1;
    }

    /// Stores a snapshot fetched from `started` on, unless a write landed
    /// since `seen` was taken or a newer snapshot is already cached.
    fn store(&self, resource: &str, started: Instant, seen: Generation, entries: &Entries) {
        let snapshot = Snapshot {
            fetched_at: started,
            entries: entries.clone(),
        };
        match self.cache.entry(resource.to_string()) {
            Entry::Occupied(mut slot) => {
                if self.generation(resource) == seen && slot.get().fetched_at <= started {
                    slot.insert(snapshot);
                    return;
                }
            }
            Entry::Vacant(slot) => {
                if self.generation(resource) == seen {
                    slot.insert(snapshot);
                    return;
                }
            }
        }
        debug!(%resource, "state cache refresh raced a write, not cached");
    }
}

impl StateBackend for CachedBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn upsert<'a>(
        &'a self,
        resource: &'a str,
        key: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            self.inner.upsert(resource, key, record).await?;
            self.mark_written(resource);
            if let Some(mut snapshot) = self.cache.get_mut(resource) {
                snapshot.entries.insert(key.to_string(), record.clone());
            }
            Ok(())
        })
    }

    fn upsert_all<'a>(
        &'a self,
        resource: &'a str,
        entries: &'a Entries,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            self.inner.upsert_all(resource, entries).await?;
            self.mark_written(resource);
            self.cache.insert(
                resource.to_string(),
                Snapshot {
                    fetched_at: Instant::now(),
                    entries: entries.clone(),
                },
            );
            Ok(())
        })
    }

    fn list<'a>(&'a self, resource: &'a str) -> BoxFuture<'a, StateResult<Entries>> {
        Box::pin(async move {
            if let Some(entries) = self.fresh(resource) {
                return Ok(entries);
            }
            let started = Instant::now();
            let seen = self.generation(resource);
            let entries = self.inner.list(resource).await?;
            debug!(%resource, count = entries.len(), "state cache refreshed");
            self.store(resource, started, seen, &entries);
            Ok(entries)
        })
    }

    fn remove<'a>(&'a self, resource: &'a str, key: &'a str) -> BoxFuture<'a, StateResult<bool>> {
        Box::pin(async move {
            let existed = self.inner.remove(resource, key).await?;
            self.mark_written(resource);
            if let Some(mut snapshot) = self.cache.get_mut(resource) {
                snapshot.entries.remove(key);
            }
            Ok(existed)
        })
    }

    fn flush(&self) -> BoxFuture<'_, StateResult<()>> {
        Box::pin(async move {
            self.inner.flush().await?;
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.cache.clear();
            Ok(())
        })
    }
}
