//! The backend contract every state store implementation fulfils.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::StateResult;
use crate::types::Record;

/// Boxed future returned by backend operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Contents of one namespace: key → record.
pub type Entries = HashMap<String, Record>;

/// Key-hash storage over named namespaces.
///
/// Writes are last-writer-wins per key. No ordering is promised across
/// keys or namespaces.
pub trait StateBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Write one record, overwriting any previous value for `key`.
    fn upsert<'a>(
        &'a self,
        resource: &'a str,
        key: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, StateResult<()>>;

    /// Replace the whole namespace with exactly `entries`.
    ///
    /// Keys not present in `entries` are gone afterwards. An empty map
    /// clears the namespace.
    fn upsert_all<'a>(
        &'a self,
        resource: &'a str,
        entries: &'a Entries,
    ) -> BoxFuture<'a, StateResult<()>>;

    /// Snapshot of a namespace. Undecodable values are skipped.
    fn list<'a>(&'a self, resource: &'a str) -> BoxFuture<'a, StateResult<Entries>>;

    /// Delete one record. Returns whether it existed.
    fn remove<'a>(&'a self, resource: &'a str, key: &'a str) -> BoxFuture<'a, StateResult<bool>>;

    /// Wipe every namespace.
    fn flush(&self) -> BoxFuture<'_, StateResult<()>>;
}
