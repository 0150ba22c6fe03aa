//! Exchange configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retired::DEFAULT_RETIRED_CAPACITY;

/// How a limit order treats a crossed spread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Always rest, even when the price crosses the opposite best.
    #[default]
    RestOnly,
    /// Match against crossing opposite levels first, rest the remainder.
    CrossThenRest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// One independent book per entry
    pub markets: Vec<String>,
    pub limit_policy: LimitPolicy,
    /// Resting orders each book can hold before its arena grows
    pub order_capacity: u32,
    /// Filled or canceled IDs each book remembers for `AlreadyInactive`
    pub retired_capacity: usize,
}

impl ExchangeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            markets: vec!["ETH".to_string()],
            limit_policy: LimitPolicy::RestOnly,
            order_capacity: 4096,
            retired_capacity: DEFAULT_RETIRED_CAPACITY,
        }
    }
}
