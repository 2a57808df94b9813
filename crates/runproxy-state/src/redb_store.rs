//! Embedded backend backed by redb.
//!
//! Every namespace shares a single `records` table. Keys are composite,
//! `{resource}\0{key}`, so a namespace is one contiguous key range and a
//! bulk replace is a single write transaction.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::backend::{BoxFuture, Entries, StateBackend};
use crate::error::{StateError, StateResult};
use crate::types::Record;

/// All records, JSON-encoded, keyed by `{resource}\0{key}`.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn composite_key(resource: &str, key: &str) -> String {
    format!("{resource}\0{key}")
}

fn namespace_prefix(resource: &str) -> String {
    format!("{resource}\0")
}

/// Single-node persistent state.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open (or create) a state file at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let backend = Self { db: Arc::new(db) };
        backend.ensure_tables()?;
        debug!(?path, "redb state opened");
        Ok(backend)
    }

    /// Ephemeral redb database held in memory.
    pub fn open_in_memory() -> StateResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(map_err!(Open))?;
        let backend = Self { db: Arc::new(db) };
        backend.ensure_tables()?;
        Ok(backend)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RECORDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn upsert_sync(&self, resource: &str, key: &str, record: &Record) -> StateResult<()> {
        let value = record.encode().map_err(map_err!(Serialize))?;
        let key = composite_key(resource, key);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_bytes())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn replace_sync(&self, resource: &str, entries: &Entries) -> StateResult<()> {
        let prefix = namespace_prefix(resource);
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, record) in entries {
            let value = record.encode().map_err(map_err!(Serialize))?;
            encoded.push((composite_key(resource, key), value));
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            let stale: Vec<String> = table
                .range(prefix.as_str()..)
                .map_err(map_err!(Read))?
                .map_while(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    k.starts_with(&prefix).then_some(k)
                })
                .collect();
            for key in &stale {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            for (key, value) in &encoded {
                table
                    .insert(key.as_str(), value.as_bytes())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%resource, count = entries.len(), "namespace replaced");
        Ok(())
    }

    fn list_sync(&self, resource: &str) -> StateResult<Entries> {
        let prefix = namespace_prefix(resource);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        let mut results = Entries::new();
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let Some(name) = key.value().strip_prefix(prefix.as_str()) else {
                break;
            };
            match Record::decode(value.value()) {
                Some(record) => {
                    results.insert(name.to_string(), record);
                }
                None => debug!(%resource, key = name, "skipping undecodable record"),
            }
        }
        Ok(results)
    }

    fn remove_sync(&self, resource: &str, key: &str) -> StateResult<bool> {
        let key = composite_key(resource, key);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    fn flush_sync(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table.retain(|_, _| false).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl StateBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn upsert<'a>(
        &'a self,
        resource: &'a str,
        key: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move { self.upsert_sync(resource, key, record) })
    }

    fn upsert_all<'a>(
        &'a self,
        resource: &'a str,
        entries: &'a Entries,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move { self.replace_sync(resource, entries) })
    }

    fn list<'a>(&'a self, resource: &'a str) -> BoxFuture<'a, StateResult<Entries>> {
        Box::pin(async move { self.list_sync(resource) })
    }

    fn remove<'a>(&'a self, resource: &'a str, key: &'a str) -> BoxFuture<'a, StateResult<bool>> {
        Box::pin(async move { self.remove_sync(resource, key) })
    }

    fn flush(&self) -> BoxFuture<'_, StateResult<()>> {
        Box::pin(async move { self.flush_sync() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str, f64)]) -> Entries {
        pairs
            .iter()
            .map(|(k, s, u)| (k.to_string(), Record::new(*s, *u)))
            .collect()
    }

    #[tokio::test]
    async fn upsert_and_list() {
        let backend = RedbBackend::open_in_memory().unwrap();
        backend
            .upsert("{executors}", "exec-1", &Record::new("online", 12.0))
            .await
            .unwrap();

        let listed = backend.list("{executors}").await.unwrap();
        assert_eq!(listed, entries(&[("exec-1", "online", 12.0)]));
    }

    #[tokio::test]
    async fn namespaces_do_not_bleed_into_each_other() {
        let backend = RedbBackend::open_in_memory().unwrap();
        backend
            .upsert("{runtimes}exec", "a", &Record::new("pass", 1.0))
            .await
            .unwrap();
        backend
            .upsert("{runtimes}exec-2", "b", &Record::new("pass", 2.0))
            .await
            .unwrap();

        let listed = backend.list("{runtimes}exec").await.unwrap();
        assert_eq!(listed, entries(&[("a", "pass", 1.0)]));
    }

    #[tokio::test]
    async fn upsert_all_prunes_unreported_keys() {
        let backend = RedbBackend::open_in_memory().unwrap();
        let before = entries(&[("A", "pass", 1.0), ("B", "pass", 2.0), ("C", "pass", 3.0)]);
        backend.upsert_all("{runtimes}h", &before).await.unwrap();

        let after = entries(&[("A", "pass", 10.0), ("B", "fail", 0.0)]);
        backend.upsert_all("{runtimes}h", &after).await.unwrap();

        assert_eq!(backend.list("{runtimes}h").await.unwrap(), after);
    }

    #[tokio::test]
    async fn remove_and_flush() {
        let backend = RedbBackend::open_in_memory().unwrap();
        backend
            .upsert("{executors}", "a", &Record::new("online", 0.0))
            .await
            .unwrap();
        backend
            .upsert("{executors}", "b", &Record::new("online", 0.0))
            .await
            .unwrap();

        assert!(backend.remove("{executors}", "a").await.unwrap());
        assert!(!backend.remove("{executors}", "a").await.unwrap());
        assert_eq!(backend.list("{executors}").await.unwrap().len(), 1);

        backend.flush().await.unwrap();
        assert!(backend.list("{executors}").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_values_are_skipped() {
        let backend = RedbBackend::open_in_memory().unwrap();
        backend
            .upsert("{executors}", "good", &Record::new("online", 1.0))
            .await
            .unwrap();

        let txn = backend.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(RECORDS).unwrap();
            let key = composite_key("{executors}", "bad");
            table.insert(key.as_str(), b"{oops".as_slice()).unwrap();
        }
        txn.commit().unwrap();

        let listed = backend.list("{executors}").await.unwrap();
        assert_eq!(listed, entries(&[("good", "online", 1.0)]));
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let backend = RedbBackend::open(&path).unwrap();
            backend
                .upsert("{executors}", "exec-1", &Record::new("online", 3.0))
                .await
                .unwrap();
        }

        let backend = RedbBackend::open(&path).unwrap();
        let listed = backend.list("{executors}").await.unwrap();
        assert_eq!(listed, entries(&[("exec-1", "online", 3.0)]));
    }
}
