//! Replicated backend on redis (single node or cluster).
//!
//! A namespace is one redis hash; each field holds a JSON record. The
//! single-node flavour replaces a namespace inside MULTI/EXEC. Cluster
//! connections issue the `DEL` and the `HSET` one after the other, so a
//! reader can briefly observe the namespace empty.

use std::collections::HashMap;

use redis::AsyncCommands;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use tracing::{debug, info};

use crate::backend::{BoxFuture, Entries, StateBackend};
use crate::error::{StateError, StateResult};
use crate::types::Record;

macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Redis-backed state over any multiplexed async connection.
#[derive(Clone)]
pub struct RedisBackend<C> {
    conn: C,
    atomic_replace: bool,
    name: &'static str,
}

impl RedisBackend<ConnectionManager> {
    /// Connect to a single redis node (`redis://host:port/db`).
    pub async fn connect(url: &str) -> StateResult<Self> {
        let client = redis::Client::open(url).map_err(map_err!(Open))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_err!(Open))?;
        info!("connected to redis state");
        Ok(Self {
            conn,
            atomic_replace: true,
            name: "redis",
        })
    }
}

impl RedisBackend<ClusterConnection> {
    /// Connect to a redis cluster given its seed nodes (`host:port`).
    pub async fn connect_cluster(nodes: &[String], password: Option<&str>) -> StateResult<Self> {
        let urls: Vec<String> = nodes.iter().map(|n| format!("redis://{n}")).collect();
        let mut builder = ClusterClient::builder(urls);
        if let Some(password) = password {
            builder = builder.password(password.to_string());
        }
        let client = builder.build().map_err(map_err!(Open))?;
        let conn = client
            .get_async_connection()
            .await
            .map_err(map_err!(Open))?;
        info!(nodes = nodes.len(), "connected to redis cluster state");
        Ok(Self {
            conn,
            atomic_replace: false,
            name: "redis-cluster",
        })
    }
}

impl<C> StateBackend for RedisBackend<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn upsert<'a>(
        &'a self,
        resource: &'a str,
        key: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            let value = record.encode().map_err(map_err!(Serialize))?;
            let mut conn = self.conn.clone();
            let _: () = conn
                .hset(resource, key, value)
                .await
                .map_err(map_err!(Redis))?;
            Ok(())
        })
    }

    fn upsert_all<'a>(
        &'a self,
        resource: &'a str,
        entries: &'a Entries,
    ) -> BoxFuture<'a, StateResult<()>> {
        Box::pin(async move {
            let mut fields = Vec::with_capacity(entries.len());
            for (key, record) in entries {
                let value = record.encode().map_err(map_err!(Serialize))?;
                fields.push((key.as_str(), value));
            }

            let mut conn = self.conn.clone();
            if self.atomic_replace {
                let mut pipe = redis::pipe();
                pipe.atomic().del(resource).ignore();
                if !fields.is_empty() {
                    pipe.hset_multiple(resource, &fields).ignore();
                }
                let _: () = pipe.query_async(&mut conn).await.map_err(map_err!(Redis))?;
            } else {
                let _: () = conn.del(resource).await.map_err(map_err!(Redis))?;
                if !fields.is_empty() {
                    let _: () = conn
                        .hset_multiple(resource, &fields)
                        .await
                        .map_err(map_err!(Redis))?;
                }
            }
            debug!(%resource, count = fields.len(), "namespace replaced");
            Ok(())
        })
    }

    fn list<'a>(&'a self, resource: &'a str) -> BoxFuture<'a, StateResult<Entries>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let raw: HashMap<String, String> =
                conn.hgetall(resource).await.map_err(map_err!(Redis))?;
            let mut entries = Entries::with_capacity(raw.len());
            for (key, value) in raw {
                match Record::decode(value.as_bytes()) {
                    Some(record) => {
                        entries.insert(key, record);
                    }
                    None => debug!(%resource, %key, "skipping undecodable record"),
                }
            }
            Ok(entries)
        })
    }

    fn remove<'a>(&'a self, resource: &'a str, key: &'a str) -> BoxFuture<'a, StateResult<bool>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let removed: i64 = conn.hdel(resource, key).await.map_err(map_err!(Redis))?;
            Ok(removed > 0)
        })
    }

    fn flush(&self) -> BoxFuture<'_, StateResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let _: () = redis::cmd("FLUSHALL")
                .query_async(&mut conn)
                .await
                .map_err(map_err!(Redis))?;
            Ok(())
        })
    }
}

/// Split a cluster host list (`[a:1;b:2]`, `a:1,b:2`) into seed nodes.
pub fn parse_cluster_hosts(hosts: &str) -> Vec<String> {
    hosts
        .trim_matches(|c| c == '[' || c == ']')
        .split([';', ','])
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
