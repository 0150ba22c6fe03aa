//! Book snapshots - the exported view of one market's resting orders.

use serde::{Deserialize, Serialize};

use crate::command::Side;
use crate::error::Result;
use crate::matching::MatchingEngine;
use crate::price_level::PriceLevel;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: u64,
    pub side: Side,
    pub size: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: u64,
    pub total_size: u64,
    /// Time priority, earliest first
    pub orders: Vec<OrderSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub market: String,
    /// Highest price first
    pub best_bids: Vec<LevelSnapshot>,
    /// Lowest price first
    pub best_asks: Vec<LevelSnapshot>,
    pub bid_volume: u64,
    pub ask_volume: u64,
}

impl BookSnapshot {
    pub fn capture(market: &str, engine: &MatchingEngine) -> Self {
        let levels = |levels: Vec<&PriceLevel>| -> Vec<LevelSnapshot> {
            levels
                .into_iter()
                .map(|level| LevelSnapshot {
                    price: level.price,
                    total_size: level.total_qty,
                    orders: level
                        .iter(&engine.arena)
                        .map(|node| OrderSnapshot {
                            id: node.order_id,
                            side: node.side,
                            size: node.qty,
                            timestamp: node.timestamp,
                        })
                        .collect(),
                })
                .collect()
        };

        Self {
            market: market.to_string(),
            best_bids: levels(engine.best_bids()),
            best_asks: levels(engine.best_asks()),
            bid_volume: engine.aggregate_volume(Side::Bid),
            ask_volume: engine.aggregate_volume(Side::Ask),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn order_count(&self) -> usize {
        self.best_bids
            .iter()
            .chain(&self.best_asks)
            .map(|l| l.orders.len())
            .sum()
    }
}
