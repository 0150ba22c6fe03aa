//! Arena - slab storage for resting orders with cache-line sized nodes.
//!
//! Price levels never own orders; they link arena indices. A pruned level
//! therefore cannot leave a dangling reference behind, and freed slots are
//! recycled through a free list threaded through the `next` field.

use std::fmt;

use crate::command::Side;
use crate::order::Order;

/// Sentinel value representing a null/invalid index
pub const NULL_INDEX: u32 = u32::MAX;

/// Arena indices are 32-bit "compressed pointers".
pub type ArenaIndex = u32;

/// A resting order - one cache line.
///
/// | Field      | Type | Offset | Size |
/// |------------|------|--------|------|
/// | price      | u64  | 0      | 8    |
/// | qty        | u64  | 8      | 8    |
/// | order_id   | u64  | 16     | 8    |
/// | timestamp  | u64  | 24     | 8    |
/// | next       | u32  | 32     | 4    |
/// | prev       | u32  | 36     | 4    |
/// | side       | u8   | 40     | 1    |
/// | (padding)  | -    | 41     | 23   |
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct OrderNode {
    /// Price of the level this order rests in
    pub price: u64,
    /// Remaining quantity
    pub qty: u64,
    pub order_id: u64,
    /// Submission time (ns since epoch)
    pub timestamp: u64,

    // FIFO linkage within a PriceLevel
    pub next: ArenaIndex,
    pub prev: ArenaIndex,

    pub side: Side,
}

const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

impl OrderNode {
    #[inline]
    pub fn new(order_id: u64, side: Side, price: u64, qty: u64, timestamp: u64) -> Self {
        Self {
            price,
            qty,
            order_id,
            timestamp,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            side,
        }
    }

    /// Build a resting node from an incoming order at `price`.
    #[inline]
    pub fn resting(order: &Order, price: u64) -> Self {
        Self::new(order.id, order.side, price, order.remaining, order.timestamp)
    }

    #[inline]
    const fn vacant(next: ArenaIndex) -> Self {
        Self {
            price: 0,
            qty: 0,
            order_id: 0,
            timestamp: 0,
            next,
            prev: NULL_INDEX,
            side: Side::Bid,
        }
    }

    /// Copy the node out as a caller-facing order.
    #[inline]
    pub fn to_order(&self) -> Order {
        Order {
            id: self.order_id,
            side: self.side,
            remaining: self.qty,
            timestamp: self.timestamp,
            price: Some(self.price),
        }
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("order_id", &self.order_id)
            .field("side", &self.side)
            .field("price", &self.price)
            .field("qty", &self.qty)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Growable slab with O(1) allocation and deallocation.
pub struct Arena {
    nodes: Vec<OrderNode>,
    /// Head of the free list
    free_head: ArenaIndex,
    allocated_count: u32,
}

impl Arena {
    /// Create an arena with room for `capacity` orders before it has to grow.
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.min(NULL_INDEX - 1);
        Self {
            nodes: Vec::with_capacity(capacity as usize),
            free_head: NULL_INDEX,
            allocated_count: 0,
        }
    }

    /// Store `node` and return its index.
    ///
    /// Reuses a freed slot when one exists, otherwise appends. Returns `None`
    /// only when the 32-bit index space is exhausted.
    #[inline]
    pub fn alloc(&mut self, node: OrderNode) -> Option<ArenaIndex> {
        let index = if self.free_head != NULL_INDEX {
            let index = self.free_head;
            self.free_head = self.nodes[index as usize].next;
            self.nodes[index as usize] = node;
            index
        } else {
            let index = u32::try_from(self.nodes.len()).ok().filter(|&i| i < NULL_INDEX)?;
            self.nodes.push(node);
            index
        };

        let slot = &mut self.nodes[index as usize];
        slot.next = NULL_INDEX;
        slot.prev = NULL_INDEX;
        self.allocated_count += 1;
        Some(index)
    }

    /// Return a slot to the free list.
    ///
    /// The caller must have unlinked the node from its level first.
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!((index as usize) < self.nodes.len(), "Index out of bounds");
        debug_assert!(self.allocated_count > 0, "Double free detected");

        self.nodes[index as usize] = OrderNode::vacant(self.free_head);
        self.free_head = index;
        self.allocated_count -= 1;
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &OrderNode {
        &self.nodes[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut OrderNode {
        &mut self.nodes[index as usize]
    }

    /// Number of live orders.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Slots ever handed out (live + free).
    #[inline]
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("slots", &self.nodes.len())
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}
