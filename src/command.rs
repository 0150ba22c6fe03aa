//! Command and outcome types for the matching engine.
//!
//! Commands are what adapters submit for one market.
//! Outcomes and matches are what they get back; a settlement adapter can
//! compute transfers from a `Match` without touching engine internals.

use serde::{Deserialize, Serialize};

use crate::order::Order;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

// ============================================================================
// Input Commands
// ============================================================================

/// Rest a new order at a price
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaceLimit {
    pub side: Side,
    /// Fixed-point price in ticks
    pub price: u64,
    pub size: u64,
}

/// Take liquidity from the opposite side until filled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaceMarket {
    pub side: Side,
    pub size: u64,
}

/// Cancel a resting order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelOrder {
    pub order_id: u64,
}

/// Cancel + replace. The replacement gets a fresh ID and joins the back
/// of the queue at its new price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifyOrder {
    pub order_id: u64,
    pub new_price: u64,
    pub new_size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    PlaceLimit(PlaceLimit),
    PlaceMarket(PlaceMarket),
    Cancel(CancelOrder),
    Modify(ModifyOrder),
}

// ============================================================================
// Output
// ============================================================================

/// One fill between a resting (maker) order and an incoming (taker) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Resting order that provided the liquidity
    pub maker_order_id: u64,
    /// Incoming order that took it
    pub taker_order_id: u64,
    /// Side of the incoming order
    pub taker_side: Side,
    /// Price of the maker's level
    pub price: u64,
    /// Filled quantity
    pub qty: u64,
}

/// A market order's result: the filled incoming order and its matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketFill {
    pub order: Order,
    pub matches: Vec<Match>,
}

/// Result of a successful command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Limit order resting in the book. `matches` is only non-empty when the
    /// book crosses limit orders before resting them.
    Rested { order: Order, matches: Vec<Match> },
    /// Incoming order fully executed against resting liquidity
    Executed { order: Order, matches: Vec<Match> },
    /// Order removed from the book, with the size it still had
    Canceled(Order),
    /// Original canceled, replacement rested
    Modified { canceled: Order, replacement: Order, matches: Vec<Match> },
}

impl From<MarketFill> for Outcome {
    fn from(fill: MarketFill) -> Self {
        Outcome::Executed { order: fill.order, matches: fill.matches }
    }
}

impl Outcome {
    /// Matches produced by the command, empty for pure rests and cancels.
    pub fn matches(&self) -> &[Match] {
        match self {
            Outcome::Rested { matches, .. }
            | Outcome::Executed { matches, .. }
            | Outcome::Modified { matches, .. } => matches,
            Outcome::Canceled(_) => &[],
        }
    }
}
