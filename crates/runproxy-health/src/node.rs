//! Result of probing one executor during a sweep.

use std::collections::BTreeMap;

use runproxy_state::{RuntimeRecord, RuntimeStatus};
use serde_json::{Map, Value};

/// Hostname, online flag and the state payload the executor reported.
///
/// Online nodes carry the decoded `/v1/health` body; offline nodes carry
/// `{"message": <diagnostic>}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    hostname: String,
    online: bool,
    state: Map<String, Value>,
}

impl Node {
    pub fn online(hostname: impl Into<String>, state: Map<String, Value>) -> Self {
        Self {
            hostname: hostname.into(),
            online: true,
            state,
        }
    }

    pub fn offline(hostname: impl Into<String>, message: impl Into<String>) -> Self {
        let mut state = Map::new();
        state.insert("message".to_string(), Value::String(message.into()));
        Self {
            hostname: hostname.into(),
            online: false,
            state,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Reported host usage; 0 when absent.
    pub fn usage(&self) -> f64 {
        self.state.get("usage").and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn message(&self) -> Option<&str> {
        self.state.get("message").and_then(Value::as_str)
    }

    /// Reported runtimes. Missing status reads as offline, missing usage
    /// as 100; entries that are not objects are skipped.
    pub fn runtimes(&self) -> BTreeMap<String, RuntimeRecord> {
        let Some(Value::Object(runtimes)) = self.state.get("runtimes") else {
            return BTreeMap::new();
        };
        runtimes
            .iter()
            .filter_map(|(id, runtime)| {
                let runtime = runtime.as_object()?;
                let status = runtime
                    .get("status")
                    .and_then(Value::as_str)
                    .map(RuntimeStatus::parse)
                    .unwrap_or_default();
                let usage = runtime
                    .get("usage")
                    .and_then(Value::as_f64)
                    .unwrap_or(100.0);
                Some((id.clone(), RuntimeRecord { status, usage }))
            })
            .collect()
    }
}
