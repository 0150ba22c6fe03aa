//! Order Book - price and order-ID indices for one market.
//!
//! Each side is a sparse price → level map; the map doubles as the level
//! collection, so a level is registered exactly when it is non-empty.
//! Price priority is recovered by sorting the keys on demand.

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ArenaIndex};
use crate::command::Side;
use crate::price_level::PriceLevel;

/// Where a resting order lives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderInfo {
    pub arena_index: ArenaIndex,
    pub side: Side,
    pub price: u64,
}

pub struct OrderBook {
    /// Bid price levels (buy orders)
    pub bids: FxHashMap<u64, PriceLevel>,
    /// Ask price levels (sell orders)
    pub asks: FxHashMap<u64, PriceLevel>,
    /// Cached best bid price (highest buy price)
    best_bid: Option<u64>,
    /// Cached best ask price (lowest sell price)
    best_ask: Option<u64>,
    /// Resting quantity per side; never exceeds `u64::MAX`, which also
    /// bounds every level total on that side
    bid_volume: u64,
    ask_volume: u64,
    /// OrderId -> OrderInfo, resting orders only
    order_map: FxHashMap<u64, OrderInfo>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    pub fn with_capacity(levels: usize, orders: usize) -> Self {
        Self {
            bids: FxHashMap::with_capacity_and_hasher(levels, Default::default()),
            asks: FxHashMap::with_capacity_and_hasher(levels, Default::default()),
            best_bid: None,
            best_ask: None,
            bid_volume: 0,
            ask_volume: 0,
            order_map: FxHashMap::with_capacity_and_hasher(orders, Default::default()),
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.best_bid
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.best_ask
    }

    #[inline]
    pub fn best_price(&self, side: Side) -> Option<u64> {
        match side {
            Side::Bid => self.best_bid,
            Side::Ask => self.best_ask,
        }
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    #[inline]
    pub fn levels(&self, side: Side) -> &FxHashMap<u64, PriceLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    pub fn get_level(&self, side: Side, price: u64) -> Option<&PriceLevel> {
        self.levels(side).get(&price)
    }

    #[inline]
    pub fn get_level_mut(&mut self, side: Side, price: u64) -> Option<&mut PriceLevel> {
        match side {
            Side::Bid => self.bids.get_mut(&price),
            Side::Ask => self.asks.get_mut(&price),
        }
    }

    #[inline]
    fn get_or_create_level(&mut self, side: Side, price: u64) -> &mut PriceLevel {
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        levels.entry(price).or_insert_with(|| PriceLevel::new(price))
    }

    /// Prices on `side` in price priority: descending for bids, ascending
    /// for asks.
    pub fn sorted_prices(&self, side: Side) -> Vec<u64> {
        let mut prices: Vec<u64> = self.levels(side).keys().copied().collect();
        match side {
            Side::Bid => prices.sort_unstable_by(|a, b| b.cmp(a)),
            Side::Ask => prices.sort_unstable(),
        }
        prices
    }

    /// Levels on `side` in price priority.
    pub fn sorted_levels(&self, side: Side) -> Vec<&PriceLevel> {
        let levels = self.levels(side);
        self.sorted_prices(side)
            .into_iter()
            .filter_map(|price| levels.get(&price))
            .collect()
    }

    /// Total resting quantity on `side`. O(1).
    #[inline]
    pub fn aggregate_volume(&self, side: Side) -> u64 {
        match side {
            Side::Bid => self.bid_volume,
            Side::Ask => self.ask_volume,
        }
    }

    /// Whether `qty` more can rest on `side` without overflowing its volume.
    #[inline]
    pub fn has_room(&self, side: Side, qty: u64) -> bool {
        self.aggregate_volume(side).checked_add(qty).is_some()
    }

    #[inline]
    fn volume_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::Bid => &mut self.bid_volume,
            Side::Ask => &mut self.ask_volume,
        }
    }

    /// Record `qty` filled out of `side`'s levels by matching.
    #[inline]
    pub fn consume_volume(&mut self, side: Side, qty: u64) {
        let volume = self.volume_mut(side);
        debug_assert!(*volume >= qty);
        *volume -= qty;
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest an allocated order at `price`, creating the level if needed.
    ///
    /// # Returns
    /// `false` if `order_id` is already resting, or if the order's size
    /// would overflow the side's volume (nothing is changed)
    pub fn add_order(
        &mut self,
        arena: &mut Arena,
        order_id: u64,
        side: Side,
        price: u64,
        arena_index: ArenaIndex,
    ) -> bool {
        let qty = arena.get(arena_index).qty;
        if self.order_map.contains_key(&order_id) || !self.has_room(side, qty) {
            return false;
        }

        *self.volume_mut(side) += qty;
        self.order_map.insert(order_id, OrderInfo { arena_index, side, price });
        self.get_or_create_level(side, price).push_back(arena, arena_index);
        self.update_best_price_on_add(side, price);

        true
    }

    /// Unlink a resting order from its level and the order index, pruning
    /// the level if it empties. The arena slot is left for the caller.
    pub fn remove_order(&mut self, arena: &mut Arena, order_id: u64) -> Option<OrderInfo> {
        let info = self.order_map.remove(&order_id)?;
        *self.volume_mut(info.side) -= arena.get(info.arena_index).qty;

        if let Some(level) = self.get_level_mut(info.side, info.price) {
            if level.remove(arena, info.arena_index) {
                self.remove_empty_level(info.side, info.price);
            }
        }

        Some(info)
    }

    #[inline]
    pub fn get_order(&self, order_id: u64) -> Option<&OrderInfo> {
        self.order_map.get(&order_id)
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_map.contains_key(&order_id)
    }

    /// Drop an order from the index only; matching has already unlinked it.
    #[inline]
    pub fn remove_order_from_map(&mut self, order_id: u64) {
        self.order_map.remove(&order_id);
    }

    // ========================================================================
    // Level Removal
    // ========================================================================

    /// Remove a price level and update best price if needed.
    pub fn remove_empty_level(&mut self, side: Side, price: u64) {
        match side {
            Side::Bid => {
                self.bids.remove(&price);
                if self.best_bid == Some(price) {
                    self.best_bid = self.bids.keys().copied().max();
                }
            }
            Side::Ask => {
                self.asks.remove(&price);
                if self.best_ask == Some(price) {
                    self.best_ask = self.asks.keys().copied().min();
                }
            }
        }
    }

    fn update_best_price_on_add(&mut self, side: Side, price: u64) {
        match side {
            Side::Bid => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Ask => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    pub fn order_count(&self) -> usize {
        self.order_map.len()
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_map.is_empty()
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// (total quantity, order count) at a price level
    pub fn depth_at(&self, side: Side, price: u64) -> (u64, u32) {
        self.get_level(side, price)
            .map(|l| (l.total_qty, l.count))
            .unwrap_or((0, 0))
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid)
            .field("best_ask", &self.best_ask)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.order_map.len())
            .finish()
    }
}
