use clap::Parser;
use hdrhistogram::Histogram;
use pt_lob::{EngineError, Exchange, ExchangeConfig, Outcome, Side};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Latency of exchange calls under a synthetic rest/take/cancel workload.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value_t = 1_000_000)]
    iterations: u64,
}

/// Whole nanoseconds in `elapsed`, saturating at `u64::MAX`.
fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    println!("Preparing Latency Benchmark...");

    let exchange = Exchange::new(ExchangeConfig {
        order_capacity: 100_000,
        ..ExchangeConfig::default()
    });
    let market = "ETH";

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3)?;
    let mut resting: Vec<u64> = Vec::new();
    let mut total_duration = Duration::new(0, 0);
    let mut rejected = 0u64;

    println!("Running {} iterations...", args.iterations);

    for i in 0..args.iterations {
        let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };

        let start = Instant::now();
        // 60% rest, 20% take, 20% cancel
        let result = match i % 10 {
            0 | 1 => exchange.place_market_order(market, side, 5).map(Outcome::from),
            2 | 3 if !resting.is_empty() => {
                let order_id = resting.swap_remove((i as usize * 7919) % resting.len());
                exchange.cancel_order(market, order_id).map(Outcome::Canceled)
            }
            _ => {
                let price = match side {
                    Side::Bid => 9_900 + i % 100,
                    Side::Ask => 10_000 + i % 100,
                };
                exchange.place_limit_order(market, side, price, 10)
            }
        };
        let elapsed = start.elapsed();

        match std::hint::black_box(result) {
            Ok(Outcome::Rested { order, .. }) => resting.push(order.id),
            Ok(_) => {}
            Err(EngineError::InsufficientLiquidity { .. } | EngineError::AlreadyInactive { .. }) => rejected += 1,
            Err(err) => return Err(err.into()),
        }

        histogram.saturating_record(nanos(elapsed));
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", args.iterations);
    println!("Rejected:   {}", rejected);
    println!("Throughput: {:.2} ops/sec", args.iterations as f64 / total_duration.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:8} ns: {:10} count", v.value_iterated_to(), count);
        }
    }

    Ok(())
}
