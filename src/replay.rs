//! Replay - drive an `Exchange` from a CSV order-flow file.
//!
//! Rows look like:
//!
//! ```text
//! action,market,side,price,size,order_ref
//! limit,ETH,sell,100.50,2.5,a1
//! market,ETH,buy,,1.0,
//! cancel,ETH,,,,a1
//! ```
//!
//! Prices and sizes are decimals scaled onto the engine's integer grid by a
//! [`Scale`]. `order_ref` is a caller-side name for a limit order so later
//! `cancel`/`modify` rows can point at it.

use std::collections::HashMap;
use std::io::Read;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command::{Outcome, Side};
use crate::error::{EngineError, Result};
use crate::exchange::Exchange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Limit,
    Market,
    Cancel,
    Modify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowSide {
    #[serde(alias = "bid")]
    Buy,
    #[serde(alias = "ask")]
    Sell,
}

impl From<RowSide> for Side {
    fn from(side: RowSide) -> Self {
        match side {
            RowSide::Buy => Side::Bid,
            RowSide::Sell => Side::Ask,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReplayRow {
    pub action: Action,
    pub market: String,
    pub side: Option<RowSide>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub order_ref: Option<String>,
}

/// Decimal places of the price tick and the size lot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub price_decimals: u32,
    pub size_decimals: u32,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            price_decimals: 2,
            size_decimals: 8,
        }
    }
}

impl Scale {
    pub fn price(&self, value: Decimal) -> Result<u64> {
        to_units(value, self.price_decimals, "price")
    }

    pub fn size(&self, value: Decimal) -> Result<u64> {
        to_units(value, self.size_decimals, "size")
    }

    pub fn price_to_decimal(&self, ticks: u64) -> Decimal {
        Decimal::from(ticks) / Decimal::from(10u64.pow(self.price_decimals))
    }
}

/// `value * 10^decimals` as a positive integer, or `InvalidInput`.
fn to_units(value: Decimal, decimals: u32, what: &str) -> Result<u64> {
    if value <= Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!("{what} must be positive, got {value}")));
    }
    let scaled = 10u64
        .checked_pow(decimals)
        .and_then(|factor| value.checked_mul(Decimal::from(factor)))
        .ok_or_else(|| EngineError::InvalidInput(format!("{what} {value} overflows")))?;
    if !scaled.fract().is_zero() {
        return Err(EngineError::InvalidInput(format!(
            "{what} {value} is finer than {decimals} decimal places"
        )));
    }
    scaled
        .to_u64()
        .ok_or_else(|| EngineError::InvalidInput(format!("{what} {value} overflows")))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub rows: u64,
    pub rested: u64,
    pub executed: u64,
    pub canceled: u64,
    pub modified: u64,
    /// Rows the engine refused (bad input, no liquidity, inactive order...)
    pub rejected: u64,
    pub matches: u64,
    /// Sum of matched quantity, in lots
    pub matched_qty: u64,
}

pub struct Replayer<'a> {
    exchange: &'a Exchange,
    scale: Scale,
    /// order_ref -> engine order ID
    refs: HashMap<String, u64>,
    report: ReplayReport,
}

impl<'a> Replayer<'a> {
    pub fn new(exchange: &'a Exchange, scale: Scale) -> Self {
        Self {
            exchange,
            scale,
            refs: HashMap::new(),
            report: ReplayReport::default(),
        }
    }

    /// Replay every row. Engine rejections are counted and logged; only a
    /// malformed CSV stops the replay.
    pub fn run<R: Read>(mut self, reader: R) -> Result<ReplayReport> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        for row in csv.deserialize::<ReplayRow>() {
            let row = row?;
            self.report.rows += 1;
            match self.apply(&row) {
                Ok(outcome) => self.record(&outcome),
                Err(err) => {
                    warn!(row = self.report.rows, action = ?row.action, error = %err, "row rejected");
                    self.report.rejected += 1;
                }
            }
        }

        Ok(self.report)
    }

    fn apply(&mut self, row: &ReplayRow) -> Result<Outcome> {
        let market = row.market.as_str();
        match row.action {
            Action::Limit => {
                let side = required(row.side, "side")?.into();
                let price = self.scale.price(required(row.price, "price")?)?;
                let size = self.scale.size(required(row.size, "size")?)?;
                let outcome = self.exchange.place_limit_order(market, side, price, size)?;
                if let (Outcome::Rested { order, .. }, Some(name)) = (&outcome, &row.order_ref) {
                    self.refs.insert(name.clone(), order.id);
                }
                Ok(outcome)
            }
            Action::Market => {
                let side = required(row.side, "side")?.into();
                let size = self.scale.size(required(row.size, "size")?)?;
                Ok(self.exchange.place_market_order(market, side, size)?.into())
            }
            Action::Cancel => {
                let order_id = self.resolve(row)?;
                Ok(Outcome::Canceled(self.exchange.cancel_order(market, order_id)?))
            }
            Action::Modify => {
                let order_id = self.resolve(row)?;
                let price = self.scale.price(required(row.price, "price")?)?;
                let size = self.scale.size(required(row.size, "size")?)?;
                let outcome = self.exchange.modify_order(market, order_id, price, size)?;
                if let (Outcome::Modified { replacement, .. }, Some(name)) = (&outcome, &row.order_ref) {
                    self.refs.insert(name.clone(), replacement.id);
                }
                Ok(outcome)
            }
        }
    }

    fn resolve(&self, row: &ReplayRow) -> Result<u64> {
        let name = row
            .order_ref
            .as_deref()
            .ok_or_else(|| EngineError::InvalidInput("order_ref is required".into()))?;
        self.refs
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown order_ref {name}")))
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Rested { .. } => self.report.rested += 1,
            Outcome::Executed { .. } => self.report.executed += 1,
            Outcome::Canceled(_) => self.report.canceled += 1,
            Outcome::Modified { .. } => self.report.modified += 1,
        }
        for m in outcome.matches() {
            debug!(maker = m.maker_order_id, taker = m.taker_order_id, price = m.price, qty = m.qty, "match");
            self.report.matches += 1;
            self.report.matched_qty += m.qty;
        }
    }
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| EngineError::InvalidInput(format!("{what} is required")))
}
