//! How many executors, and which, a request is sent to.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::BalancerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingMethod {
    /// Prefer warm runtimes and lightly loaded hosts.
    #[default]
    AnycastEfficient,
    /// Random spread over online executors.
    AnycastFast,
    /// Fan out to every online executor.
    Broadcast,
}

impl AddressingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressingMethod::AnycastEfficient => "anycast-efficient",
            AddressingMethod::AnycastFast => "anycast-fast",
            AddressingMethod::Broadcast => "broadcast",
        }
    }

    /// Resolve the request header, falling back to `default` when absent.
    ///
    /// A value that names no method still routes: it takes the
    /// non-efficient anycast path.
    pub fn from_header(value: Option<&str>, default: AddressingMethod) -> Self {
        match value.map(str::trim) {
            None | Some("") => default,
            Some(v) => v.parse().unwrap_or_else(|_| {
                warn!(value = v, "unrecognised addressing method, using anycast-fast");
                AddressingMethod::AnycastFast
            }),
        }
    }
}

impl FromStr for AddressingMethod {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anycast-efficient" => Ok(AddressingMethod::AnycastEfficient),
            "anycast-fast" => Ok(AddressingMethod::AnycastFast),
            "broadcast" => Ok(AddressingMethod::Broadcast),
            _ => Err(BalancerError::UnknownAddressingMethod(s.to_string())),
        }
    }
}

impl fmt::Display for AddressingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
