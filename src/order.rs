//! Order - the unit of intent handed across the engine boundary.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::command::Side;

/// An order as seen by callers.
///
/// Resting orders live in the arena; this is the value copied out of it (or
/// the incoming order being matched, which never enters the arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique ID, fixed at creation
    pub id: u64,
    pub side: Side,
    /// Remaining size; only matching decreases it
    pub remaining: u64,
    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: u64,
    /// Price of the level the order rests in, `None` when not resting
    pub price: Option<u64>,
}

impl Order {
    pub fn new(id: u64, side: Side, size: u64, timestamp: u64) -> Self {
        Self {
            id,
            side,
            remaining: size,
            timestamp,
            price: None,
        }
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    #[inline]
    pub fn is_resting(&self) -> bool {
        self.price.is_some()
    }
}

/// Exchange-wide order ID sequence, starting at 1.
#[derive(Debug)]
pub struct OrderIds {
    next: AtomicU64,
}

impl OrderIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for OrderIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in nanoseconds, saturating to 0 outside the
/// representable range.
pub fn now_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or(0)
}
