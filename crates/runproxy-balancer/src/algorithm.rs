//! Selection algorithms.
//!
//! An algorithm only picks an index into the candidates a tier left over;
//! it never sees the filter. Round-robin keeps one counter shared by every
//! clone, so all requests served by a process advance the same cycle.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use tracing::warn;

use crate::error::BalancerError;

/// Lock-free round-robin over a pool whose size may change between calls.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    counter: Arc<AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index, wrapping around `count`. `None` if count is zero.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(idx % count)
    }

    /// Current counter value (for diagnostics).
    pub fn current(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Algorithm {
    #[default]
    Random,
    RoundRobin(RoundRobin),
    First,
    Last,
}

impl Algorithm {
    pub fn round_robin() -> Self {
        Algorithm::RoundRobin(RoundRobin::new())
    }

    /// Configured algorithm by name; unknown names fall back to random.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(algorithm) => algorithm,
            Err(_) => {
                warn!(algorithm = %name, "unknown balancing algorithm, using random");
                Algorithm::Random
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Random => "random",
            Algorithm::RoundRobin(_) => "round-robin",
            Algorithm::First => "first",
            Algorithm::Last => "last",
        }
    }

    /// Pick an index among `count` candidates.
    pub fn pick(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        match self {
            Algorithm::Random => Some(rand::rng().random_range(0..count)),
            Algorithm::RoundRobin(rr) => rr.next(count),
            Algorithm::First => Some(0),
            Algorithm::Last => Some(count - 1),
        }
    }
}

impl FromStr for Algorithm {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Algorithm::Random),
            "round-robin" | "roundrobin" => Ok(Algorithm::round_robin()),
            "first" => Ok(Algorithm::First),
            "last" => Ok(Algorithm::Last),
            _ => Err(BalancerError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
