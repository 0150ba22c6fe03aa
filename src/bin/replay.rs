use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use pt_lob::{Exchange, ExchangeConfig, LimitPolicy, Replayer, Scale};
use tracing_subscriber::EnvFilter;

/// Replay a CSV order-flow file through the exchange and print the result.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV with columns action,market,side,price,size,order_ref
    input: PathBuf,

    /// JSON exchange config; overrides --market and --cross
    #[arg(long)]
    config: Option<PathBuf>,

    /// Markets to open (repeatable)
    #[arg(long = "market", default_value = "ETH")]
    markets: Vec<String>,

    /// Let limit orders match crossing liquidity before resting
    #[arg(long)]
    cross: bool,

    #[arg(long, default_value_t = 2)]
    price_decimals: u32,

    #[arg(long, default_value_t = 8)]
    size_decimals: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExchangeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ExchangeConfig {
            markets: args.markets.clone(),
            limit_policy: if args.cross { LimitPolicy::CrossThenRest } else { LimitPolicy::RestOnly },
            ..ExchangeConfig::default()
        },
    };
    let scale = Scale {
        price_decimals: args.price_decimals,
        size_decimals: args.size_decimals,
    };

    let exchange = Exchange::new(config);
    let input = BufReader::new(File::open(&args.input)?);
    let report = Replayer::new(&exchange, scale).run(input)?;

    tracing::info!(
        rows = report.rows,
        rejected = report.rejected,
        matched_qty = report.matched_qty,
        "replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    for market in exchange.markets() {
        let snapshot = exchange.get_book_snapshot(market)?;
        if let (Some(bid), Some(ask)) = (snapshot.best_bids.first(), snapshot.best_asks.first()) {
            tracing::info!(
                market,
                best_bid = %scale.price_to_decimal(bid.price),
                best_ask = %scale.price_to_decimal(ask.price),
                "top of book"
            );
        }
        println!("{}", snapshot.to_json()?);
    }

    Ok(())
}
