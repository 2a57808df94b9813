//! Records persisted by the state store.
//!
//! Backends only know the raw [`Record`] (`{status, usage}`); the typed
//! executor/runtime views are built on top by [`crate::StateStore`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace holding one record per executor, keyed by hostname.
pub const RESOURCE_EXECUTORS: &str = "{executors}";

/// Prefix of the per-executor runtime namespaces.
///
/// The braces form a redis-cluster hash tag, so every proxy namespace
/// hashes to the same slot.
pub const RESOURCE_RUNTIMES: &str = "{runtimes}";

/// Namespace holding the runtimes of one executor.
pub fn runtimes_resource(hostname: &str) -> String {
    format!("{RESOURCE_RUNTIMES}{hostname}")
}

/// Raw `{status, usage}` value stored under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub usage: f64,
}

impl Record {
    pub fn new(status: impl Into<String>, usage: f64) -> Self {
        Self {
            status: status.into(),
            usage,
        }
    }

    /// Compact JSON form used by the serialized backends.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a stored value; `None` for anything that is not a record.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}

/// Availability of an executor host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorStatus {
    Online,
    #[default]
    Offline,
}

impl ExecutorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorStatus::Online => "online",
            ExecutorStatus::Offline => "offline",
        }
    }

    /// Lenient parse: anything but `online` is offline.
    pub fn parse(s: &str) -> Self {
        if s == "online" {
            ExecutorStatus::Online
        } else {
            ExecutorStatus::Offline
        }
    }
}

impl fmt::Display for ExecutorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of a warm runtime container on an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Pass,
    Fail,
    #[default]
    Offline,
}

impl RuntimeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeStatus::Pass => "pass",
            RuntimeStatus::Fail => "fail",
            RuntimeStatus::Offline => "offline",
        }
    }

    /// Lenient parse: unknown strings are offline.
    pub fn parse(s: &str) -> Self {
        match s {
            "pass" => RuntimeStatus::Pass,
            "fail" => RuntimeStatus::Fail,
            _ => RuntimeStatus::Offline,
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one runtime, scoped to its owning executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    pub status: RuntimeStatus,
    pub usage: f64,
}

impl From<&Record> for RuntimeRecord {
    fn from(record: &Record) -> Self {
        Self {
            status: RuntimeStatus::parse(&record.status),
            usage: record.usage,
        }
    }
}

impl From<RuntimeRecord> for Record {
    fn from(runtime: RuntimeRecord) -> Self {
        Record::new(runtime.status.as_str(), runtime.usage)
    }
}

/// An executor together with its known runtimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRecord {
    #[serde(skip)]
    pub hostname: String,
    pub status: ExecutorStatus,
    pub usage: f64,
    pub runtimes: BTreeMap<String, RuntimeRecord>,
}

impl ExecutorRecord {
    /// Placeholder for a host the store knows nothing about.
    pub fn unknown(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: ExecutorStatus::Offline,
            usage: 100.0,
            runtimes: BTreeMap::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ExecutorStatus::Online
    }
}
