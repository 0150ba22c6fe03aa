//! Concurrency Tests - many tasks hammering one `Exchange`.
//!
//! Every call takes its market's lock for exactly one command, so whatever
//! the interleaving, volume must be conserved and each book must pass its
//! invariant scan afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pt_lob::{EngineError, Exchange, ExchangeConfig, Outcome, Side};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const MARKETS: [&str; 2] = ["ETH", "BTC"];

fn exchange() -> Arc<Exchange> {
    Arc::new(Exchange::new(ExchangeConfig {
        markets: MARKETS.iter().map(|m| m.to_string()).collect(),
        ..ExchangeConfig::default()
    }))
}

#[derive(Default)]
struct Tally {
    placed: AtomicU64,
    matched: AtomicU64,
    canceled: AtomicU64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_volume_conservation() {
    let ex = exchange();
    let tally = Arc::new(Tally::default());

    let mut tasks = Vec::new();
    for task in 0..16u64 {
        let ex = Arc::clone(&ex);
        let tally = Arc::clone(&tally);
        tasks.push(tokio::spawn(async move {
            let mut rng = ChaCha8Rng::seed_from_u64(task);
            let mut mine: Vec<(&str, u64)> = Vec::new();

            for _ in 0..2_000 {
                let market = MARKETS[rng.gen_range(0..MARKETS.len())];
                let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
                match rng.gen_range(0..10) {
                    0..=5 => {
                        let price = match side {
                            Side::Bid => rng.gen_range(9_900..10_000),
                            Side::Ask => rng.gen_range(10_000..10_100),
                        };
                        let size = rng.gen_range(1..20);
                        if let Outcome::Rested { order, .. } = ex.place_limit_order(market, side, price, size).unwrap() {
                            tally.placed.fetch_add(size, Ordering::Relaxed);
                            mine.push((market, order.id));
                        }
                    }
                    6 | 7 => match ex.place_market_order(market, side, rng.gen_range(1..40)) {
                        Ok(fill) => {
                            let qty: u64 = fill.matches.iter().map(|m| m.qty).sum();
                            tally.matched.fetch_add(qty, Ordering::Relaxed);
                        }
                        Err(EngineError::InsufficientLiquidity { .. }) => {}
                        Err(err) => panic!("market order failed: {err}"),
                    },
                    _ => {
                        if mine.is_empty() {
                            continue;
                        }
                        let (market, id) = mine.swap_remove(rng.gen_range(0..mine.len()));
                        match ex.cancel_order(market, id) {
                            Ok(order) => {
                                tally.canceled.fetch_add(order.remaining, Ordering::Relaxed);
                            }
                            // Someone else's market order got there first
                            Err(EngineError::AlreadyInactive { .. }) => {}
                            Err(err) => panic!("cancel failed: {err}"),
                        }
                    }
                }
                if rng.gen_ratio(1, 64) {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let mut resting = 0u64;
    for market in MARKETS {
        let snap = ex.get_book_snapshot(market).unwrap();
        resting += snap.bid_volume + snap.ask_volume;
        ex.with_engine(market, |e| e.matcher.check_invariants()).unwrap().unwrap();
    }

    let placed = tally.placed.load(Ordering::Relaxed);
    let matched = tally.matched.load(Ordering::Relaxed);
    let canceled = tally.canceled.load(Ordering::Relaxed);
    assert_eq!(placed, resting + matched + canceled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_market_orders_never_overfill() {
    let ex = exchange();
    for _ in 0..100 {
        ex.place_limit_order("ETH", Side::Ask, 10_000, 10).unwrap();
    }

    // 1_000 units of liquidity, 40 takers of 30 each: some must be refused whole
    let mut tasks = Vec::new();
    for _ in 0..40 {
        let ex = Arc::clone(&ex);
        tasks.push(tokio::spawn(async move { ex.place_market_order("ETH", Side::Bid, 30) }));
    }

    let mut filled = 0u64;
    let mut refused = 0u64;
    for task in tasks {
        match task.await.unwrap() {
            Ok(fill) => {
                assert!(fill.order.is_filled());
                filled += fill.matches.iter().map(|m| m.qty).sum::<u64>();
            }
            Err(EngineError::InsufficientLiquidity { requested, available }) => {
                assert_eq!(requested, 30);
                assert!(available < 30);
                refused += 1;
            }
            Err(err) => panic!("unexpected {err}"),
        }
    }

    assert_eq!(filled, 990);
    assert_eq!(refused, 7);
    assert_eq!(ex.get_book_snapshot("ETH").unwrap().ask_volume, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ids_unique_across_markets() {
    let ex = exchange();
    let mut tasks = Vec::new();
    for task in 0..8usize {
        let ex = Arc::clone(&ex);
        tasks.push(tokio::spawn(async move {
            let market = MARKETS[task % MARKETS.len()];
            (0..500)
                .map(|i| match ex.place_limit_order(market, Side::Bid, 100 + i, 1).unwrap() {
                    Outcome::Rested { order, .. } => order.id,
                    other => panic!("expected Rested, got {other:?}"),
                })
                .collect::<Vec<u64>>()
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.extend(task.await.unwrap());
    }
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(ids.first(), Some(&1));
    assert_eq!(ids.last(), Some(&(total as u64)));
}
