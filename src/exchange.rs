//! Exchange - the multi-market front adapters call into.
//!
//! Owns one `Engine` per market behind its own reader/writer lock. The
//! market set is fixed at construction, so the map itself needs no lock.
//! Each mutating call holds the market's write lock for exactly one
//! command; snapshots take the read lock and never see a half-applied
//! command. Nothing in here performs I/O, so no lock is ever held across it.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::command::{Command, MarketFill, Outcome, Side};
use crate::config::ExchangeConfig;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::matching::MatchingEngine;
use crate::order::{Order, OrderIds};
use crate::snapshot::BookSnapshot;

pub struct Exchange {
    markets: FxHashMap<String, RwLock<Engine>>,
    config: ExchangeConfig,
}

impl Exchange {
    /// Build one book per configured market. A market listed twice gets a
    /// single book and is listed once, at its first position.
    pub fn new(mut config: ExchangeConfig) -> Self {
        let ids = Arc::new(OrderIds::new());
        let mut markets: FxHashMap<String, RwLock<Engine>> = FxHashMap::default();
        config.markets.retain(|market| {
            if markets.contains_key(market) {
                warn!(market = %market, "duplicate market in config ignored");
                return false;
            }
            let matcher = MatchingEngine::with_retention(
                config.order_capacity,
                config.limit_policy,
                config.retired_capacity,
            );
            let engine = Engine::with_matcher(market.clone(), matcher, Arc::clone(&ids));
            markets.insert(market.clone(), RwLock::new(engine));
            true
        });

        info!(markets = ?config.markets, policy = ?config.limit_policy, "exchange ready");
        Self { markets, config }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Market names in configuration order.
    pub fn markets(&self) -> impl Iterator<Item = &str> {
        self.config.markets.iter().map(String::as_str)
    }

    fn market(&self, market_id: &str) -> Result<&RwLock<Engine>> {
        self.markets
            .get(market_id)
            .ok_or_else(|| EngineError::UnknownMarket(market_id.to_string()))
    }

    /// Apply one command to one market under its write lock.
    pub fn execute(&self, market_id: &str, cmd: Command) -> Result<Outcome> {
        self.market(market_id)?.write().process_command(cmd)
    }

    /// Rest a limit order. Returns the resting order; under the default
    /// policy it never matches.
    pub fn place_limit_order(&self, market_id: &str, side: Side, price: u64, size: u64) -> Result<Outcome> {
        self.market(market_id)?.write().place_limit(side, price, size)
    }

    /// Execute a market order in full, or fail with `InsufficientLiquidity`
    /// and leave the book untouched.
    pub fn place_market_order(&self, market_id: &str, side: Side, size: u64) -> Result<MarketFill> {
        self.market(market_id)?.write().place_market(side, size)
    }

    /// Cancel a resting order, returning what was left of it.
    pub fn cancel_order(&self, market_id: &str, order_id: u64) -> Result<Order> {
        self.market(market_id)?.write().cancel(order_id)
    }

    pub fn modify_order(&self, market_id: &str, order_id: u64, new_price: u64, new_size: u64) -> Result<Outcome> {
        self.market(market_id)?.write().modify(order_id, new_price, new_size)
    }

    pub fn get_book_snapshot(&self, market_id: &str) -> Result<BookSnapshot> {
        Ok(self.market(market_id)?.read().snapshot())
    }

    /// Run `f` against a market's engine under the read lock.
    pub fn with_engine<T>(&self, market_id: &str, f: impl FnOnce(&Engine) -> T) -> Result<T> {
        Ok(f(&*self.market(market_id)?.read()))
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(ExchangeConfig::default())
    }
}
