//! In-process backend: one concurrent table shared by every task.
//!
//! Each namespace is a single dashmap row, so replacing a namespace is
//! atomic with respect to readers of that namespace.

use dashmap::DashMap;

use crate::backend::{BoxFuture, Entries, StateBackend};
use crate::error::StateResult;
use crate::types::Record;

/// Typed in-memory state, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: DashMap<String, Entries>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn upsert<'a>(
        &'a self,
        resource: &'a str,
        key: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            self.namespaces
                .entry(resource.to_string())
                .or_default()
                .insert(key.to_string(), record.clone());
            Ok(())
        })
    }

    fn upsert_all<'a>(
        &'a self,
        resource: &'a str,
        entries: &'a Entries,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            if entries.is_empty() {
                self.namespaces.remove(resource);
            } else {
                self.namespaces.insert(resource.to_string(), entries.clone());
            }
            Ok(())
        })
    }

    fn list<'a>(&'a self, resource: &'a str) -> BoxFuture<'a, StateResult<Entries>> {
        Box::pin(async move {
            Ok(self
                .namespaces
                .get(resource)
                .map(|ns| ns.value().clone())
                .unwrap_or_default())
        })
    }

    fn remove<'a>(&'a self, resource: &'a str, key: &'a str) -> BoxFuture<'a, StateResult<bool>> {
        Box::pin(async move {
            Ok(self
                .namespaces
                .get_mut(resource)
                .map(|mut ns| ns.remove(key).is_some())
                .unwrap_or(false))
        })
    }

    fn flush(&self) -> BoxFuture<'_, StateResult<()>> {
        Box::pin(async move {
            self.namespaces.clear();
            Ok(())
        })
    }
}
