//! Operating mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Production strips internals from error bodies; development adds
/// diagnostics (error file/line/trace, executor hostname echo header,
/// per-request debug logging, un-deduplicated health transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Mode::Development
    }

    /// Environment label attached to error reports.
    pub fn environment(self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Development => "staging",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "production" => Ok(Mode::Production),
            "development" => Ok(Mode::Development),
            other => Err(ConfigError::InvalidValue {
                field: "mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Production => f.write_str("production"),
            Mode::Development => f.write_str("development"),
        }
    }
}
