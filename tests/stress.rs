//! Stress Tests - Push the engine to its limits.
//!
//! These tests verify correctness under extreme conditions:
//! - Arena growth and slot reuse under churn
//! - High contention at a single price level
//! - Maximum values for prices and quantities

use pt_lob::{Engine, EngineError, LimitPolicy, Outcome, Retirement, Side};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn engine() -> Engine {
    Engine::new("ETH", 1_000, LimitPolicy::RestOnly)
}

fn rest(engine: &mut Engine, side: Side, price: u64, size: u64) -> u64 {
    match engine.place_limit(side, price, size).unwrap() {
        Outcome::Rested { order, .. } => order.id,
        other => panic!("expected Rested, got {other:?}"),
    }
}

// ============================================================================
// Capacity Stress Tests
// ============================================================================

#[test]
fn test_grows_past_capacity_hint() {
    let mut engine = engine();

    for i in 0..10_000u64 {
        let (side, price) = if i % 2 == 0 {
            (Side::Bid, 8_000 + (i % 100) * 10)
        } else {
            (Side::Ask, 10_000 + (i % 100) * 10)
        };
        rest(&mut engine, side, price, 100);
    }

    assert_eq!(engine.order_count(), 10_000);
    assert_eq!(engine.best_bid(), Some(8_990));
    assert_eq!(engine.best_ask(), Some(10_000));
    engine.matcher.check_invariants().unwrap();
}

#[test]
fn test_arena_reuse_after_cancel() {
    let mut engine = engine();

    for _ in 0..50 {
        let ids: Vec<u64> = (0..100).map(|i| rest(&mut engine, Side::Bid, 9_000 + i, 10)).collect();
        for id in ids {
            engine.cancel(id).unwrap();
        }
    }

    assert_eq!(engine.order_count(), 0);
    // Slots freed by cancels are reused instead of growing the arena
    assert_eq!(engine.matcher.arena.slots(), 100);
    engine.matcher.check_invariants().unwrap();
}

// ============================================================================
// Contention Tests
// ============================================================================

#[test]
fn test_single_price_level_contention() {
    let mut engine = engine();

    let ids: Vec<u64> = (0..1_000).map(|_| rest(&mut engine, Side::Ask, 10_000, 10)).collect();
    assert_eq!(engine.matcher.book.depth_at(Side::Ask, 10_000), (10_000, 1_000));

    // Sweep half the level in one order
    let fill = engine.place_market(Side::Bid, 5_005).unwrap();
    assert_eq!(fill.matches.len(), 501);
    assert_eq!(fill.matches.last().unwrap().qty, 5);

    let makers: Vec<u64> = fill.matches.iter().map(|m| m.maker_order_id).collect();
    assert_eq!(makers, ids[..501]);

    // The partially filled order keeps its place at the head
    let head = engine.matcher.best_asks()[0].peek_head();
    assert_eq!(engine.matcher.arena.get(head).order_id, ids[500]);
    assert_eq!(engine.matcher.arena.get(head).qty, 5);
    engine.matcher.check_invariants().unwrap();
}

#[test]
fn test_cancel_from_middle_under_contention() {
    let mut engine = engine();
    let ids: Vec<u64> = (0..100).map(|_| rest(&mut engine, Side::Bid, 9_000, 1)).collect();

    for id in ids.iter().skip(1).step_by(2) {
        engine.cancel(*id).unwrap();
    }

    let fill = engine.place_market(Side::Ask, 50).unwrap();
    let makers: Vec<u64> = fill.matches.iter().map(|m| m.maker_order_id).collect();
    let expected: Vec<u64> = ids.iter().step_by(2).copied().collect();
    assert_eq!(makers, expected);
    assert_eq!(engine.best_bid(), None);
}

// ============================================================================
// Churn Tests
// ============================================================================

#[test]
fn test_rapid_add_cancel_cycles() {
    let mut engine = engine();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut live: Vec<u64> = Vec::new();

    for _ in 0..20_000 {
        if live.len() < 200 && rng.gen_bool(0.6) {
            let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
            live.push(rest(&mut engine, side, rng.gen_range(9_900..10_100), rng.gen_range(1..50)));
        } else if !live.is_empty() {
            let id = live.swap_remove(rng.gen_range(0..live.len()));
            engine.cancel(id).unwrap();
        }
    }

    assert_eq!(engine.order_count(), live.len());
    engine.matcher.check_invariants().unwrap();
}

#[test]
fn test_rapid_match_cycles() {
    let mut engine = engine();

    for round in 0..1_000u64 {
        let maker = rest(&mut engine, Side::Ask, 10_000 + round % 7, 3);
        let fill = engine.place_market(Side::Bid, 3).unwrap();
        assert_eq!(fill.matches.len(), 1);
        assert_eq!(fill.matches[0].maker_order_id, maker);
        assert!(matches!(
            engine.cancel(maker),
            Err(EngineError::AlreadyInactive { reason: Retirement::Filled, .. })
        ));
    }

    assert_eq!(engine.order_count(), 0);
    assert!(engine.matcher.book.is_empty());
    assert_eq!(engine.matcher.arena.slots(), 1);
}

// ============================================================================
// Edge Values
// ============================================================================

#[test]
fn test_max_price_and_quantity() {
    let mut engine = engine();
    rest(&mut engine, Side::Ask, u64::MAX, u64::MAX);
    rest(&mut engine, Side::Bid, 1, 1);

    assert_eq!(engine.best_ask(), Some(u64::MAX));
    assert_eq!(engine.matcher.aggregate_volume(Side::Ask), u64::MAX);

    let fill = engine.place_market(Side::Bid, u64::MAX - 1).unwrap();
    assert_eq!(fill.matches[0].price, u64::MAX);
    assert_eq!(engine.matcher.aggregate_volume(Side::Ask), 1);
}

#[test]
fn test_resting_volume_cannot_overflow() {
    let half = u64::MAX / 2 + 1;

    // Same level: the second rest would push the level total past u64::MAX
    let mut book = engine();
    rest(&mut book, Side::Ask, 100, half);
    let before = book.matcher.state_hash();
    assert!(matches!(
        book.place_limit(Side::Ask, 100, half),
        Err(EngineError::InvalidInput(_))
    ));
    assert_eq!(book.matcher.state_hash(), before);
    assert_eq!(book.order_count(), 1);
    assert_eq!(book.matcher.aggregate_volume(Side::Ask), half);
    book.matcher.check_invariants().unwrap();

    // Different levels: each fits, the side total would not
    let mut book = engine();
    rest(&mut book, Side::Ask, 100, half);
    assert!(matches!(
        book.place_limit(Side::Ask, 200, half),
        Err(EngineError::InvalidInput(_))
    ));
    assert_eq!(book.matcher.best_asks().len(), 1);

    let fill = book.place_market(Side::Bid, 5).unwrap();
    assert_eq!(fill.matches[0].price, 100);
    assert_eq!(book.matcher.aggregate_volume(Side::Ask), half - 5);

    // The other side is unaffected
    rest(&mut book, Side::Bid, 50, half);
    book.matcher.check_invariants().unwrap();
}

#[test]
fn test_quantity_one() {
    let mut engine = engine();
    for _ in 0..10 {
        rest(&mut engine, Side::Bid, 5_000, 1);
    }

    let fill = engine.place_market(Side::Ask, 10).unwrap();
    assert_eq!(fill.matches.len(), 10);
    assert!(fill.matches.iter().all(|m| m.qty == 1));
    assert_eq!(engine.best_bid(), None);
}

#[test]
fn test_many_price_levels() {
    let mut engine = engine();
    for price in 1..=5_000u64 {
        rest(&mut engine, Side::Ask, price, 1);
    }
    assert_eq!(engine.matcher.book.ask_levels(), 5_000);

    let fill = engine.place_market(Side::Bid, 4_999).unwrap();
    let prices: Vec<u64> = fill.matches.iter().map(|m| m.price).collect();
    assert_eq!(prices, (1..5_000).collect::<Vec<_>>());
    assert_eq!(engine.best_ask(), Some(5_000));
    assert_eq!(engine.matcher.book.ask_levels(), 1);
}

#[test]
fn test_self_trade_allowed() {
    // No owner identity: an order can match anything on the other side
    let mut engine = engine();
    let ask = rest(&mut engine, Side::Ask, 100, 5);
    rest(&mut engine, Side::Bid, 100, 5);

    let fill = engine.place_market(Side::Bid, 5).unwrap();
    assert_eq!(fill.matches[0].maker_order_id, ask);
    assert_eq!(engine.best_bid(), Some(100));
}
