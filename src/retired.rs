//! Retired order IDs - a bounded memory of orders that left the book.
//!
//! Cancel uses it to tell `AlreadyInactive` from `OrderNotFound`. Only the
//! most recent `capacity` retirements are kept; older IDs are evicted in
//! retirement order and fall back to `OrderNotFound`.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::error::Retirement;

/// Retirements remembered per book unless configured otherwise.
pub const DEFAULT_RETIRED_CAPACITY: usize = 65_536;

pub struct RetiredIds {
    reasons: FxHashMap<u64, Retirement>,
    /// Retirement order, oldest first
    order: VecDeque<u64>,
    capacity: usize,
}

impl RetiredIds {
    pub fn new(capacity: usize) -> Self {
        let hint = capacity.min(DEFAULT_RETIRED_CAPACITY);
        Self {
            reasons: FxHashMap::with_capacity_and_hasher(hint, Default::default()),
            order: VecDeque::with_capacity(hint),
            capacity,
        }
    }

    /// Remember `order_id`, evicting the oldest entry when full.
    pub fn insert(&mut self, order_id: u64, reason: Retirement) {
        if self.capacity == 0 {
            return;
        }
        if self.reasons.insert(order_id, reason).is_some() {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.reasons.remove(&oldest);
            }
        }
        self.order.push_back(order_id);
    }

    #[inline]
    pub fn get(&self, order_id: u64) -> Option<Retirement> {
        self.reasons.get(&order_id).copied()
    }

    #[inline]
    pub fn contains(&self, order_id: u64) -> bool {
        self.reasons.contains_key(&order_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RetiredIds {
    fn default() -> Self {
        Self::new(DEFAULT_RETIRED_CAPACITY)
    }
}

impl std::fmt::Debug for RetiredIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetiredIds")
            .field("len", &self.reasons.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
