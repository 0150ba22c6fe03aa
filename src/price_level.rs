//! Price Level - A FIFO queue of orders at a single price point.
//!
//! Implements a doubly-linked list using arena indices for O(1)
//! insertion, removal from head, and removal from arbitrary position.
//! Removal never reorders the survivors, so time priority holds without
//! re-sorting.

use crate::arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
use crate::command::Match;
use crate::order::Order;

/// A queue of orders at a specific price level.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    /// Fixed for the lifetime of the level
    pub price: u64,
    /// Index of the oldest order (highest priority, first to match)
    pub head: ArenaIndex,
    /// Index of the newest order (last to match)
    pub tail: ArenaIndex,
    /// Sum of remaining quantity across all orders at this level
    pub total_qty: u64,
    /// Number of orders at this level
    pub count: u32,
}

/// What a matching pass against one level produced.
#[derive(Debug, Default)]
pub struct LevelFill {
    /// In the order the resting orders were hit (earliest first)
    pub matches: Vec<Match>,
    /// Resting orders that reached zero. Already unlinked from the level but
    /// still allocated; the caller retires and frees them.
    pub filled: Vec<ArenaIndex>,
}

impl PriceLevel {
    #[inline]
    pub const fn new(price: u64) -> Self {
        Self {
            price,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_qty: 0,
            count: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an order to the tail of the queue (newest order).
    ///
    /// The node's `price` is set to the level's price: that is the order's
    /// back-reference to where it rests.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn push_back(&mut self, arena: &mut Arena, index: ArenaIndex) {
        let node = arena.get_mut(index);
        node.price = self.price;
        node.next = NULL_INDEX;
        node.prev = self.tail;
        let qty = node.qty;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
        } else {
            arena.get_mut(self.tail).next = index;
        }
        self.tail = index;

        self.count += 1;
        self.total_qty += qty;
    }

    /// Remove and return the head order (oldest/highest priority).
    ///
    /// The order is NOT freed from the arena; caller must do that.
    #[inline]
    pub fn pop_front(&mut self, arena: &mut Arena) -> Option<ArenaIndex> {
        if self.head == NULL_INDEX {
            return None;
        }
        let index = self.head;
        self.remove(arena, index);
        Some(index)
    }

    /// Remove an order from anywhere in the queue (for cancel).
    ///
    /// # Returns
    /// `true` if the level is now empty, `false` otherwise.
    /// The order is NOT freed from the arena; caller must do that.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn remove(&mut self, arena: &mut Arena, index: ArenaIndex) -> bool {
        let node = arena.get(index);
        let prev_idx = node.prev;
        let next_idx = node.next;
        let qty = node.qty;

        if prev_idx == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next_idx;
        } else {
            arena.get_mut(prev_idx).next = next_idx;
        }

        if next_idx == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev_idx;
        } else {
            arena.get_mut(next_idx).prev = prev_idx;
        }

        debug_assert!(self.total_qty >= qty);
        self.count -= 1;
        self.total_qty -= qty;

        let node = arena.get_mut(index);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;

        self.count == 0
    }

    /// Index of the head order, or `NULL_INDEX` if empty.
    #[inline]
    pub const fn peek_head(&self) -> ArenaIndex {
        self.head
    }

    /// Update total quantity after a partial fill.
    #[inline]
    pub fn subtract_qty(&mut self, qty: u64) {
        debug_assert!(self.total_qty >= qty);
        self.total_qty -= qty;
    }

    /// Match `incoming` against this level in time priority.
    ///
    /// Walks from the head, filling `min(resting, incoming)` each step, and
    /// stops as soon as `incoming` is filled. Resting orders that hit zero
    /// are unlinked after the walk, never during it.
    pub fn fill_against(&mut self, arena: &mut Arena, incoming: &mut Order) -> LevelFill {
        let mut fill = LevelFill::default();
        let mut cursor = self.head;

        while cursor != NULL_INDEX && !incoming.is_filled() {
            let resting = arena.get_mut(cursor);
            let qty = resting.qty.min(incoming.remaining);

            resting.qty -= qty;
            incoming.remaining -= qty;

            fill.matches.push(Match {
                maker_order_id: resting.order_id,
                taker_order_id: incoming.id,
                taker_side: incoming.side,
                price: self.price,
                qty,
            });
            if resting.qty == 0 {
                fill.filled.push(cursor);
            }
            cursor = resting.next;
            self.subtract_qty(qty);
        }

        for &index in &fill.filled {
            self.remove(arena, index);
        }

        fill
    }

    /// Orders in time priority.
    pub fn iter<'a>(&self, arena: &'a Arena) -> LevelIter<'a> {
        LevelIter {
            arena,
            cursor: self.head,
        }
    }

    /// Full-scan sum of member quantities, for verification only.
    pub fn recount(&self, arena: &Arena) -> (u64, u32) {
        self.iter(arena)
            .fold((0, 0), |(qty, count), node| (qty + node.qty, count + 1))
    }
}

/// Head-to-tail walk over a level's orders.
pub struct LevelIter<'a> {
    arena: &'a Arena,
    cursor: ArenaIndex,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a OrderNode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_INDEX {
            return None;
        }
        let node = self.arena.get(self.cursor);
        self.cursor = node.next;
        Some(node)
    }
}
