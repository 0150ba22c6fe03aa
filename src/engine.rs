//! Engine - single-market command processor.
//!
//! `process_command` is the one entry point for every mutation of a book:
//! it validates, assigns IDs and timestamps, and applies the command to the
//! `MatchingEngine`. Callers serialize access either by holding the
//! `Exchange`'s per-market lock, or, with the `runtime` feature, by feeding
//! a dedicated thread through an rtrb ring buffer.

use std::sync::Arc;

use crate::command::{Command, MarketFill, Outcome, Side};
use crate::config::LimitPolicy;
use crate::error::{EngineError, Result};
use crate::matching::MatchingEngine;
use crate::order::{now_nanos, Order, OrderIds};
use crate::snapshot::BookSnapshot;

pub struct Engine {
    market: String,
    /// The underlying matching engine
    pub matcher: MatchingEngine,
    ids: Arc<OrderIds>,
}

impl Engine {
    /// Standalone engine with its own ID sequence.
    pub fn new(market: impl Into<String>, capacity: u32, policy: LimitPolicy) -> Self {
        Self::with_matcher(market, MatchingEngine::new(capacity, policy), Arc::new(OrderIds::new()))
    }

    /// Engine around a prebuilt book, drawing IDs from a sequence that may
    /// be shared with other markets.
    pub fn with_matcher(market: impl Into<String>, matcher: MatchingEngine, ids: Arc<OrderIds>) -> Self {
        Self {
            market: market.into(),
            matcher,
            ids,
        }
    }

    #[inline]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Run the engine event loop until the command producer is dropped.
    ///
    /// Every command yields exactly one result on `output`; if the output
    /// ring is full the loop waits for the consumer rather than dropping.
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<Command>,
        output: &mut rtrb::Producer<Result<Outcome>>,
        pin_to_core: bool,
    ) {
        if pin_to_core {
            self.pin_to_core();
        }
        tracing::info!(market = %self.market, "engine loop started");

        loop {
            while let Ok(cmd) = input.pop() {
                let mut result = self.process_command(cmd);
                loop {
                    match output.push(result) {
                        Ok(()) => break,
                        Err(rtrb::PushError::Full(back)) => {
                            if output.is_abandoned() {
                                tracing::warn!(market = %self.market, "output consumer gone, stopping");
                                return;
                            }
                            result = back;
                            std::hint::spin_loop();
                        }
                    }
                }
            }
            if input.is_abandoned() {
                break;
            }
            std::hint::spin_loop();
        }
        tracing::info!(market = %self.market, "engine loop stopped");
    }

    /// Apply a single command.
    ///
    /// Input is validated before an ID is drawn, so rejected commands do not
    /// consume IDs.
    pub fn process_command(&mut self, cmd: Command) -> Result<Outcome> {
        match cmd {
            Command::PlaceLimit(place) => self.place_limit(place.side, place.price, place.size),
            Command::PlaceMarket(place) => self.place_market(place.side, place.size).map(Outcome::from),
            Command::Cancel(cancel) => self.cancel(cancel.order_id).map(Outcome::Canceled),
            Command::Modify(modify) => self.modify(modify.order_id, modify.new_price, modify.new_size),
        }
    }

    pub fn place_limit(&mut self, side: Side, price: u64, size: u64) -> Result<Outcome> {
        validate(price, "price")?;
        validate(size, "size")?;
        let order = self.new_order(side, size);
        self.matcher.place_limit(price, order)
    }

    pub fn place_market(&mut self, side: Side, size: u64) -> Result<MarketFill> {
        validate(size, "size")?;
        let order = self.new_order(side, size);
        self.matcher.place_market(order)
    }

    pub fn cancel(&mut self, order_id: u64) -> Result<Order> {
        self.matcher.cancel(order_id)
    }

    /// Cancel + replace on the same side with a fresh ID.
    pub fn modify(&mut self, order_id: u64, new_price: u64, new_size: u64) -> Result<Outcome> {
        validate(new_price, "price")?;
        validate(new_size, "size")?;
        let side = match self.matcher.order(order_id) {
            Some(order) => order.side,
            None => return Err(self.matcher.inactive_error(order_id)),
        };
        let replacement = self.new_order(side, new_size);
        self.matcher.modify(order_id, new_price, replacement)
    }

    fn new_order(&self, side: Side, size: u64) -> Order {
        Order::new(self.ids.next_id(), side, size, now_nanos())
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot::capture(&self.market, &self.matcher)
    }

    /// Pin the current thread to the last available CPU core.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.matcher.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.matcher.best_ask()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.matcher.order_count()
    }

    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }
}

fn validate(value: u64, what: &str) -> Result<()> {
    if value == 0 {
        return Err(EngineError::InvalidInput(format!("{what} must be positive")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CancelOrder, ModifyOrder, PlaceLimit, PlaceMarket};

    fn limit(side: Side, price: u64, size: u64) -> Command {
        Command::PlaceLimit(PlaceLimit { side, price, size })
    }

    fn resting_id(outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Rested { order, .. } => order.id,
            other => panic!("expected Rested, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);
        assert_eq!(engine.market(), "ETH");
        assert_eq!(engine.order_count(), 0);
        assert_eq!(engine.best_bid(), None);
        assert_eq!(engine.best_ask(), None);
    }

    #[test]
    fn test_ids_and_timestamps_follow_submission() {
        let mut engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);

        let a = engine.process_command(limit(Side::Bid, 10_000, 5)).unwrap();
        let b = engine.process_command(limit(Side::Bid, 10_000, 10)).unwrap();
        let (a, b) = match (a, b) {
            (Outcome::Rested { order: a, .. }, Outcome::Rested { order: b, .. }) => (a, b),
            other => panic!("unexpected {other:?}"),
        };
        assert!(b.id > a.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn test_rejected_input_consumes_no_id() {
        let mut engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);

        assert!(matches!(
            engine.process_command(limit(Side::Bid, 0, 5)),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.process_command(Command::PlaceMarket(PlaceMarket { side: Side::Ask, size: 0 })),
            Err(EngineError::InvalidInput(_))
        ));

        let id = resting_id(engine.process_command(limit(Side::Bid, 100, 5)).unwrap());
        assert_eq!(id, 1);
    }

    #[test]
    fn test_engine_place_market_and_cancel() {
        let mut engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);
        let ask = resting_id(engine.process_command(limit(Side::Ask, 10_000, 8)).unwrap());

        let outcome = engine
            .process_command(Command::PlaceMarket(PlaceMarket { side: Side::Bid, size: 3 }))
            .unwrap();
        assert_eq!(outcome.matches().len(), 1);
        assert_eq!(outcome.matches()[0].maker_order_id, ask);

        match engine.process_command(Command::Cancel(CancelOrder { order_id: ask })).unwrap() {
            Outcome::Canceled(order) => assert_eq!(order.remaining, 5),
            other => panic!("expected Canceled, got {other:?}"),
        }
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_engine_modify() {
        let mut engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);
        let id = resting_id(engine.process_command(limit(Side::Ask, 10_000, 8)).unwrap());

        let outcome = engine
            .process_command(Command::Modify(ModifyOrder { order_id: id, new_price: 10_050, new_size: 4 }))
            .unwrap();
        match outcome {
            Outcome::Modified { canceled, replacement, .. } => {
                assert_eq!(canceled.id, id);
                assert_eq!(replacement.side, Side::Ask);
                assert_eq!(replacement.price, Some(10_050));
            }
            other => panic!("expected Modified, got {other:?}"),
        }
        assert_eq!(engine.best_ask(), Some(10_050));

        assert!(matches!(
            engine.process_command(Command::Modify(ModifyOrder { order_id: id, new_price: 1, new_size: 1 })),
            Err(EngineError::AlreadyInactive { .. })
        ));
    }

    #[test]
    fn test_engine_state_hash_determinism() {
        let mut engine1 = Engine::new("ETH", 1000, LimitPolicy::RestOnly);
        let mut engine2 = Engine::new("ETH", 1000, LimitPolicy::RestOnly);

        for i in 0..100u64 {
            let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
            let price = if side == Side::Bid { 9_000 + (i % 10) * 10 } else { 10_000 + (i % 10) * 10 };
            engine1.process_command(limit(side, price, 100)).unwrap();
            engine2.process_command(limit(side, price, 100)).unwrap();
        }

        assert_eq!(engine1.state_hash(), engine2.state_hash());
    }

    #[cfg(feature = "runtime")]
    #[test]
    fn test_run_loop_answers_every_command() {
        let (mut cmd_tx, mut cmd_rx) = rtrb::RingBuffer::<Command>::new(64);
        let (mut out_tx, mut out_rx) = rtrb::RingBuffer::<Result<Outcome>>::new(2);

        let worker = std::thread::spawn(move || {
            let mut engine = Engine::new("ETH", 1000, LimitPolicy::RestOnly);
            engine.run(&mut cmd_rx, &mut out_tx, false);
            engine.order_count()
        });

        for i in 0..10 {
            cmd_tx.push(limit(Side::Bid, 100 + i, 1)).unwrap();
        }
        cmd_tx.push(Command::Cancel(CancelOrder { order_id: 999 })).unwrap();

        let mut results = Vec::new();
        while results.len() < 11 {
            if let Ok(r) = out_rx.pop() {
                results.push(r);
            }
        }
        drop(cmd_tx);

        assert!(results[..10].iter().all(|r| r.is_ok()));
        assert!(matches!(results[10], Err(EngineError::OrderNotFound(999))));
        assert_eq!(worker.join().unwrap(), 10);
    }
}
