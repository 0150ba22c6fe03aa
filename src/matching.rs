//! Matching Engine - the book operations for one market.
//!
//! Limit orders rest, market orders take liquidity in price-time priority,
//! cancels unlink. Every operation validates before it touches state, so a
//! returned error means the book is exactly as it was.
//!
//! With [`LimitPolicy::CrossThenRest`] a limit order first matches against
//! opposite levels at or better than its price and rests only the remainder.
//! The default, [`LimitPolicy::RestOnly`], never matches limit orders.

use tracing::{debug, warn};

use crate::arena::{Arena, ArenaIndex, OrderNode};
use crate::command::{MarketFill, Match, Outcome, Side};
use crate::config::LimitPolicy;
use crate::error::{EngineError, Result, Retirement};
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::price_level::PriceLevel;
use crate::retired::{RetiredIds, DEFAULT_RETIRED_CAPACITY};

/// The matching engine core
pub struct MatchingEngine {
    /// Storage for resting orders
    pub arena: Arena,
    /// Price and order-ID indices
    pub book: OrderBook,
    /// Recently retired IDs, with why
    retired: RetiredIds,
    policy: LimitPolicy,
}

impl MatchingEngine {
    pub fn new(capacity: u32, policy: LimitPolicy) -> Self {
        Self::with_retention(capacity, policy, DEFAULT_RETIRED_CAPACITY)
    }

    /// Like `new`, remembering at most `retired` filled or canceled IDs.
    /// Cancels of IDs older than that report `OrderNotFound`.
    pub fn with_retention(capacity: u32, policy: LimitPolicy, retired: usize) -> Self {
        Self {
            arena: Arena::new(capacity),
            book: OrderBook::with_capacity(1000, capacity as usize),
            retired: RetiredIds::new(retired),
            policy,
        }
    }

    #[inline]
    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    // ========================================================================
    // Limit Orders
    // ========================================================================

    /// Rest `order` at `price`.
    ///
    /// Under `RestOnly` the returned match list is always empty. Under
    /// `CrossThenRest` the order may be fully executed before it rests, in
    /// which case `Outcome::Executed` is returned.
    pub fn place_limit(&mut self, price: u64, mut order: Order) -> Result<Outcome> {
        if price == 0 {
            return Err(EngineError::InvalidInput("price must be positive".into()));
        }
        self.check_new_order(&order)?;
        self.check_room(order.side, order.remaining, 0)?;

        // Reserve the slot up front: nothing below can fail once matching starts.
        let arena_index = self
            .arena
            .alloc(OrderNode::resting(&order, price))
            .ok_or_else(|| EngineError::InvalidInput("order arena exhausted".into()))?;

        let mut matches = Vec::new();
        if self.policy == LimitPolicy::CrossThenRest {
            self.cross(price, &mut order, &mut matches);
        }

        if order.is_filled() {
            self.arena.free(arena_index);
            self.retired.insert(order.id, Retirement::Filled);
            debug!(order_id = order.id, fills = matches.len(), "limit order executed on entry");
            return Ok(Outcome::Executed { order, matches });
        }

        self.arena.get_mut(arena_index).qty = order.remaining;
        let added = self.book.add_order(&mut self.arena, order.id, order.side, price, arena_index);
        debug_assert!(added, "order {} passed validation but was refused", order.id);
        order.price = Some(price);

        debug!(
            order_id = order.id,
            side = ?order.side,
            price,
            size = order.remaining,
            "limit order resting"
        );
        Ok(Outcome::Rested { order, matches })
    }

    /// Match against opposite levels whose price crosses `limit`.
    fn cross(&mut self, limit: u64, order: &mut Order, matches: &mut Vec<Match>) {
        let maker_side = order.side.opposite();
        while !order.is_filled() {
            let best = match self.book.best_price(maker_side) {
                Some(price) => price,
                None => break,
            };
            if !prices_cross(limit, best, order.side) {
                break;
            }
            self.match_at_level(maker_side, best, order, matches);
        }
    }

    // ========================================================================
    // Market Orders
    // ========================================================================

    /// Execute `order` against the opposite side, best price first.
    ///
    /// All or nothing: if the opposite side's total resting volume is below
    /// the order size, returns `InsufficientLiquidity` without matching.
    pub fn place_market(&mut self, mut order: Order) -> Result<MarketFill> {
        if order.remaining == 0 {
            return Err(EngineError::InvalidInput("size must be positive".into()));
        }

        let maker_side = order.side.opposite();
        let available = self.book.aggregate_volume(maker_side);
        if order.remaining > available {
            warn!(
                order_id = order.id,
                requested = order.remaining,
                available,
                "market order rejected"
            );
            return Err(EngineError::InsufficientLiquidity {
                requested: order.remaining,
                available,
            });
        }

        let mut matches = Vec::new();
        for price in self.book.sorted_prices(maker_side) {
            if order.is_filled() {
                break;
            }
            self.match_at_level(maker_side, price, &mut order, &mut matches);
        }
        debug_assert!(order.is_filled());

        debug!(
            order_id = order.id,
            side = ?order.side,
            fills = matches.len(),
            "market order executed"
        );
        Ok(MarketFill { order, matches })
    }

    /// Fill `taker` against one level, then retire filled makers and prune
    /// the level if it emptied.
    fn match_at_level(&mut self, maker_side: Side, price: u64, taker: &mut Order, matches: &mut Vec<Match>) {
        let (fill, now_empty) = match self.book.get_level_mut(maker_side, price) {
            Some(level) => {
                let fill = level.fill_against(&mut self.arena, taker);
                (fill, level.is_empty())
            }
            None => return,
        };

        self.book
            .consume_volume(maker_side, fill.matches.iter().map(|m| m.qty).sum());
        for index in fill.filled {
            self.retire(index, Retirement::Filled);
        }
        if now_empty {
            self.book.remove_empty_level(maker_side, price);
        }
        matches.extend(fill.matches);
    }

    /// Drop an already-unlinked order from the index and free its slot.
    fn retire(&mut self, index: ArenaIndex, reason: Retirement) {
        let order_id = self.arena.get(index).order_id;
        self.book.remove_order_from_map(order_id);
        self.retired.insert(order_id, reason);
        self.arena.free(index);
    }

    // ========================================================================
    // Cancel / Modify
    // ========================================================================

    /// Remove a resting order. Returns its state at the moment of removal,
    /// with `price` cleared.
    pub fn cancel(&mut self, order_id: u64) -> Result<Order> {
        let info = match self.book.remove_order(&mut self.arena, order_id) {
            Some(info) => info,
            None => return Err(self.inactive_error(order_id)),
        };

        let mut order = self.arena.get(info.arena_index).to_order();
        order.price = None;
        self.arena.free(info.arena_index);
        self.retired.insert(order_id, Retirement::Canceled);

        debug!(order_id, canceled_qty = order.remaining, "order canceled");
        Ok(order)
    }

    /// Cancel `order_id` and rest `replacement` at `new_price`.
    ///
    /// The replacement is validated before the cancel, so on error nothing
    /// has changed.
    pub fn modify(&mut self, order_id: u64, new_price: u64, replacement: Order) -> Result<Outcome> {
        if new_price == 0 {
            return Err(EngineError::InvalidInput("price must be positive".into()));
        }
        self.check_new_order(&replacement)?;
        let original = self.order(order_id).ok_or_else(|| self.inactive_error(order_id))?;
        if original.side != replacement.side {
            return Err(EngineError::InvalidInput("modify cannot change side".into()));
        }
        self.check_room(replacement.side, replacement.remaining, original.remaining)?;

        let canceled = self.cancel(order_id)?;
        match self.place_limit(new_price, replacement)? {
            Outcome::Rested { order, matches } | Outcome::Executed { order, matches } => {
                Ok(Outcome::Modified { canceled, replacement: order, matches })
            }
            other => Ok(other),
        }
    }

    fn check_new_order(&self, order: &Order) -> Result<()> {
        if order.remaining == 0 {
            return Err(EngineError::InvalidInput("size must be positive".into()));
        }
        if self.book.contains_order(order.id) || self.retired.contains(order.id) {
            return Err(EngineError::InvalidInput(format!("duplicate order id {}", order.id)));
        }
        Ok(())
    }

    /// Refuse `qty` if resting it on `side`, after `freed` leaves that side,
    /// would overflow the side's volume.
    fn check_room(&self, side: Side, qty: u64, freed: u64) -> Result<()> {
        let current = self.book.aggregate_volume(side).saturating_sub(freed);
        if current.checked_add(qty).is_none() {
            warn!(side = ?side, size = qty, resting = current, "order would overflow resting volume");
            return Err(EngineError::InvalidInput(format!(
                "size {qty} would overflow {side:?} resting volume"
            )));
        }
        Ok(())
    }

    /// `AlreadyInactive` if `order_id` once rested here, else `OrderNotFound`.
    pub(crate) fn inactive_error(&self, order_id: u64) -> EngineError {
        match self.retired.get(order_id) {
            Some(reason) => EngineError::AlreadyInactive { order_id, reason },
            None => EngineError::OrderNotFound(order_id),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Resting order by ID.
    pub fn order(&self, order_id: u64) -> Option<Order> {
        self.book
            .get_order(order_id)
            .map(|info| self.arena.get(info.arena_index).to_order())
    }

    /// Ask levels, lowest price first.
    pub fn best_asks(&self) -> Vec<&PriceLevel> {
        self.book.sorted_levels(Side::Ask)
    }

    /// Bid levels, highest price first.
    pub fn best_bids(&self) -> Vec<&PriceLevel> {
        self.book.sorted_levels(Side::Bid)
    }

    /// Resting orders of a level in time priority.
    pub fn orders_at(&self, level: &PriceLevel) -> Vec<Order> {
        level.iter(&self.arena).map(OrderNode::to_order).collect()
    }

    #[inline]
    pub fn aggregate_volume(&self, side: Side) -> u64 {
        self.book.aggregate_volume(side)
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.book.best_ask()
    }

    #[inline]
    pub fn spread(&self) -> Option<u64> {
        self.book.spread()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    /// Compute a hash of the current state (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        for side in [Side::Bid, Side::Ask] {
            for level in self.book.sorted_levels(side) {
                level.price.hash(&mut hasher);
                for node in level.iter(&self.arena) {
                    node.order_id.hash(&mut hasher);
                    node.qty.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Full scan of every index against every other. Slow; for tests and
    /// debugging.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut seen = 0usize;

        for side in [Side::Bid, Side::Ask] {
            let side_total: u128 = self.book.levels(side).values().map(|l| l.total_qty as u128).sum();
            if side_total != self.book.aggregate_volume(side) as u128 {
                return Err(format!("{side:?} cached side volume is stale"));
            }
            for (&price, level) in self.book.levels(side) {
                if level.is_empty() {
                    return Err(format!("{side:?} level {price} is empty but indexed"));
                }
                if level.price != price {
                    return Err(format!("{side:?} level keyed {price} has price {}", level.price));
                }
                if level.recount(&self.arena) != (level.total_qty, level.count) {
                    return Err(format!("{side:?} level {price} cached volume is stale"));
                }

                for node in level.iter(&self.arena) {
                    seen += 1;
                    if node.qty == 0 {
                        return Err(format!("filled order {} still resting", node.order_id));
                    }
                    if node.side != side || node.price != price {
                        return Err(format!("order {} linked into wrong level", node.order_id));
                    }
                    match self.book.get_order(node.order_id) {
                        Some(info) if info.side == side && info.price == price => {}
                        _ => return Err(format!("order {} missing from index", node.order_id)),
                    }
                    if self.retired.contains(node.order_id) {
                        return Err(format!("order {} is both live and retired", node.order_id));
                    }
                }
            }
        }

        if seen != self.book.order_count() {
            return Err(format!("{} orders in levels, {} indexed", seen, self.book.order_count()));
        }
        if self.arena.allocated() as usize != seen {
            return Err(format!("{} arena slots live, {} orders resting", self.arena.allocated(), seen));
        }
        if self.book.best_bid() != self.book.bids.keys().copied().max()
            || self.book.best_ask() != self.book.asks.keys().copied().min()
        {
            return Err("cached best price is stale".into());
        }
        Ok(())
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(4096, LimitPolicy::default())
    }
}

/// Whether a limit price reaches the best opposite price.
#[inline]
fn prices_cross(limit: u64, opposite_best: u64, side: Side) -> bool {
    match side {
        // Buyer willing to pay >= lowest ask
        Side::Bid => limit >= opposite_best,
        // Seller willing to accept <= highest bid
        Side::Ask => limit <= opposite_best,
    }
}
