//! # pt-lob
//!
//! An in-memory, single-market-per-book limit order book with price-time
//! priority matching, fronted by a multi-market `Exchange`.
//!
//! ## Design Principles
//!
//! - **Arena-backed orders**: price levels link 32-bit arena indices, never
//!   pointers, so pruning a level cannot leave a dangling order behind
//! - **All-or-nothing**: every operation validates before it mutates; a
//!   failed call leaves the book exactly as it found it
//! - **One writer per book**: each market sits behind its own lock, or is
//!   owned by a single command-processing thread (`runtime` feature)
//!
//! ## Architecture
//!
//! ```text
//! [Adapters] --> Exchange --RwLock--> Engine (per market) --> MatchingEngine
//!                                                               |-- OrderBook (indices)
//!                                                               |-- Arena (orders)
//! ```

pub mod arena;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod matching;
pub mod order;
pub mod order_book;
pub mod price_level;
pub mod replay;
pub mod retired;
pub mod snapshot;

pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use command::{
    CancelOrder, Command, MarketFill, Match, ModifyOrder, Outcome, PlaceLimit, PlaceMarket, Side,
};
pub use config::{ExchangeConfig, LimitPolicy};
pub use engine::Engine;
pub use error::{EngineError, Retirement};
pub use exchange::Exchange;
pub use matching::MatchingEngine;
pub use order::{Order, OrderIds};
pub use order_book::OrderBook;
pub use price_level::PriceLevel;
pub use replay::{ReplayReport, Replayer, Scale};
pub use retired::{RetiredIds, DEFAULT_RETIRED_CAPACITY};
pub use snapshot::{BookSnapshot, LevelSnapshot, OrderSnapshot};
