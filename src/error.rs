//! Error taxonomy shared by the book, the exchange front and the replayer.
//!
//! Every variant is local to the operation that produced it: the book is
//! left exactly as it was before the failing call.

use thiserror::Error;

/// Why an order is no longer resting in the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Retirement {
    /// Remaining size reached zero through matching
    Filled,
    /// Removed by an explicit cancel
    Canceled,
}

impl std::fmt::Display for Retirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retirement::Filled => f.write_str("filled"),
            Retirement::Canceled => f.write_str("canceled"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Zero price or size, or a value that does not fit the tick grid
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown market: {0}")]
    UnknownMarket(String),

    /// Market order larger than the opposite side's resting volume
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u64, available: u64 },

    #[error("order {0} not found")]
    OrderNotFound(u64),

    #[error("order {order_id} is no longer active ({reason})")]
    AlreadyInactive { order_id: u64, reason: Retirement },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
