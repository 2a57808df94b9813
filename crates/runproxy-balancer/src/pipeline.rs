//! Options, tiers and the per-request pipeline.

use std::collections::{BTreeMap, HashSet};

use runproxy_state::{ExecutorRecord, ExecutorStatus, RuntimeRecord, RuntimeStatus};
use serde::Serialize;

use crate::addressing::AddressingMethod;
use crate::algorithm::Algorithm;

/// Usage (percent) at or above which a host or runtime counts as busy.
pub const USAGE_CEILING: f64 = 80.0;

/// Read-only view of one executor for a single selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancingOption {
    pub hostname: String,
    pub status: ExecutorStatus,
    pub usage: f64,
    pub runtimes: BTreeMap<String, RuntimeRecord>,
}

impl BalancingOption {
    pub fn is_online(&self) -> bool {
        self.status == ExecutorStatus::Online
    }

    pub fn runtime(&self, runtime_id: &str) -> Option<&RuntimeRecord> {
        self.runtimes.get(runtime_id)
    }
}

impl From<ExecutorRecord> for BalancingOption {
    fn from(record: ExecutorRecord) -> Self {
        Self {
            hostname: record.hostname,
            status: record.status,
            usage: record.usage,
            runtimes: record.runtimes,
        }
    }
}

/// Arrange a state snapshot into the pool the algorithms index into.
///
/// Configured executors come first, in configuration order; one missing
/// from the snapshot is included as offline with usage 100. Executors only
/// known to the store follow in hostname order.
pub fn order_options(configured: &[String], snapshot: Vec<ExecutorRecord>) -> Vec<BalancingOption> {
    let mut by_host: BTreeMap<String, ExecutorRecord> = snapshot
        .into_iter()
        .map(|record| (record.hostname.clone(), record))
        .collect();

    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(configured.len().max(by_host.len()));
    for host in configured {
        if !seen.insert(host.as_str()) {
            continue;
        }
        let record = by_host
            .remove(host)
            .unwrap_or_else(|| ExecutorRecord::unknown(host));
        options.push(record.into());
    }
    options.extend(by_host.into_values().map(BalancingOption::from));
    options
}

/// Pure predicate over one option, given the request's runtime hint.
pub type Filter = fn(&BalancingOption, Option<&str>) -> bool;

/// One rung of the fallback ladder.
#[derive(Debug, Clone)]
pub struct Tier {
    pub name: &'static str,
    pub filter: Filter,
    pub algorithm: Algorithm,
}

fn warm_runtime(option: &BalancingOption, runtime_id: Option<&str>) -> bool {
    let Some(runtime) = runtime_id.and_then(|id| option.runtime(id)) else {
        return false;
    };
    option.is_online() && runtime.status == RuntimeStatus::Pass && runtime.usage < USAGE_CEILING
}

fn low_usage(option: &BalancingOption, _: Option<&str>) -> bool {
    option.is_online() && option.usage < USAGE_CEILING
}

fn online(option: &BalancingOption, _: Option<&str>) -> bool {
    option.is_online()
}

fn any(_: &BalancingOption, _: Option<&str>) -> bool {
    true
}

/// The option a pipeline settled on.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub tier: &'static str,
    pub option: &'a BalancingOption,
}

impl Selection<'_> {
    pub fn hostname(&self) -> &str {
        &self.option.hostname
    }
}

#[derive(Debug)]
pub struct Pipeline {
    method: AddressingMethod,
    runtime_id: Option<String>,
    options: Vec<BalancingOption>,
    tiers: Vec<Tier>,
}

/// Build the pipeline for one request.
///
/// `anycast-fast` ignores `algorithm` and picks at random; `broadcast`
/// carries no tiers at all.
pub fn build_pipeline(
    method: AddressingMethod,
    runtime_id: Option<&str>,
    options: Vec<BalancingOption>,
    algorithm: &Algorithm,
) -> Pipeline {
    let runtime_id = runtime_id.filter(|id| !id.is_empty());
    let tier = |name, filter: Filter, algorithm: &Algorithm| Tier {
        name,
        filter,
        algorithm: algorithm.clone(),
    };

    let tiers = match method {
        AddressingMethod::AnycastEfficient => {
            let mut tiers = Vec::with_capacity(4);
            if runtime_id.is_some() {
                tiers.push(tier("warm-runtime", warm_runtime, algorithm));
            }
            tiers.push(tier("low-usage", low_usage, algorithm));
            tiers.push(tier("online", online, algorithm));
            tiers.push(tier("any", any, algorithm));
            tiers
        }
        AddressingMethod::AnycastFast => vec![
            tier("online", online, &Algorithm::Random),
            tier("any", any, &Algorithm::Random),
        ],
        AddressingMethod::Broadcast => Vec::new(),
    };

    Pipeline {
        method,
        runtime_id: runtime_id.map(str::to_string),
        options,
        tiers,
    }
}

impl Pipeline {
    pub fn method(&self) -> AddressingMethod {
        self.method
    }

    pub fn options(&self) -> &[BalancingOption] {
        &self.options
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Run the tiers in order; the first with any candidate picks.
    pub fn select(&self) -> Option<Selection<'_>> {
        let runtime_id = self.runtime_id.as_deref();
        for tier in &self.tiers {
            let candidates: Vec<&BalancingOption> = self
                .options
                .iter()
                .filter(|option| (tier.filter)(option, runtime_id))
                .collect();
            if let Some(idx) = tier.algorithm.pick(candidates.len()) {
                return Some(Selection {
                    tier: tier.name,
                    option: candidates[idx],
                });
            }
        }
        None
    }

    /// Fan-out set: every online option, in pool order.
    pub fn broadcast_targets(&self) -> Vec<&BalancingOption> {
        self.options.iter().filter(|o| o.is_online()).collect()
    }
}
