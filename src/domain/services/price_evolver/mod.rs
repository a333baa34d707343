//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the background process that perturbs every listed price at randomized
// intervals. Prices follow a synthetic random walk, not real market data.
//
// | Component        | Description                                              |
// |------------------|----------------------------------------------------------|
// | PriceEvolver     | Periodic whole-table price sweep                         |
// | EvolverConfig    | Tick bounds and reporting switch                         |
// | PriceReporter    | Hook receiving the table before every sweep              |
// | TracingReporter  | Default hook, logs the table at debug level              |
// | EvolverError     | Errors that abort the evolver                            |
//
//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name             | Description                                   | Return Type          |
// |------------------|-----------------------------------------------|----------------------|
// | draw_change      | Draws a signed percentage move                | i64                  |
// | apply_change     | Applies a percentage move to a price          | Result<Price, ..>    |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::models::types::{Price, Stock, price_to_decimal};
use crate::domain::services::price_store::PriceStore;

/// Errors that abort the price evolver. They indicate a logic error and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvolverError {
    /// The new price does not fit the price type
    #[error("price of {ticker} overflowed applying a {change}% move to {price}")]
    Overflow {
        ticker: String,
        price: Price,
        change: i64,
    },

    /// A move outside of the -90%..=90% range was requested
    #[error("price move of {0}% is out of range")]
    ChangeOutOfRange(i64),
}

/// Configuration of the price evolver.
#[derive(Debug, Clone)]
pub struct EvolverConfig {
    /// Shortest delay between two sweeps
    pub min_tick: Duration,
    /// Longest delay between two sweeps
    pub max_tick: Duration,
    /// Whether the default reporter logs the table before every sweep
    pub report_prices: bool,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            min_tick: Duration::from_secs(3),
            max_tick: Duration::from_secs(7),
            report_prices: false,
        }
    }
}

/// Receives the stock table before every sweep.
#[cfg_attr(test, mockall::automock)]
pub trait PriceReporter: Send + Sync {
    /// Whether the evolver should bother reading the table for this reporter.
    fn enabled(&self) -> bool;

    fn report(&self, stocks: &[Stock]);
}

/// Logs the current prices at debug level when enabled.
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    enabled: bool,
}

impl TracingReporter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl PriceReporter for TracingReporter {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn report(&self, stocks: &[Stock]) {
        let printed = stocks
            .iter()
            .map(|stock| format!("{} {}", stock.ticker, price_to_decimal(stock.price)))
            .collect::<Vec<_>>()
            .join(", ");
        debug!("Current stocks: {}", printed);
    }
}

/// Draws a signed percentage move.
///
/// The direction is a fair coin. The magnitude is 2-10% with 50% probability, 11-30% with 20%,
/// 31-60% with 10%, 61-90% with 2%, and no move otherwise.
pub fn draw_change<R: Rng>(rng: &mut R) -> i64 {
    let direction = if rng.gen_bool(0.5) { 1 } else { -1 };
    let magnitude = match rng.gen_range(0..100) {
        50..=99 => rng.gen_range(2..=10),
        30..=49 => rng.gen_range(11..=30),
        20..=29 => rng.gen_range(31..=60),
        18..=19 => rng.gen_range(61..=90),
        _ => 0,
    };
    direction * magnitude
}

/// Computes `floor(price * (100 - change) / 100)`.
pub fn apply_change(ticker: &str, price: Price, change: i64) -> Result<Price, EvolverError> {
    if !(-90..=90).contains(&change) {
        return Err(EvolverError::ChangeOutOfRange(change));
    }
    // the range check above keeps the factor within 10..=190
    let factor = (100 - change) as Price;
    price
        .checked_mul(factor)
        .map(|scaled| scaled / 100)
        .ok_or_else(|| EvolverError::Overflow {
            ticker: ticker.to_string(),
            price,
            change,
        })
}

/// Background process applying a random move to every listed price.
pub struct PriceEvolver<R = StdRng> {
    store: PriceStore,
    config: EvolverConfig,
    rng: R,
    reporter: Arc<dyn PriceReporter>,
}

impl PriceEvolver<StdRng> {
    pub fn new(store: PriceStore, config: EvolverConfig) -> Self {
        Self::with_rng(store, config, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> PriceEvolver<R> {
    pub fn with_rng(store: PriceStore, config: EvolverConfig, rng: R) -> Self {
        let reporter = Arc::new(TracingReporter::new(config.report_prices));
        Self {
            store,
            config,
            rng,
            reporter,
        }
    }

    /// Replaces the reporting hook.
    pub fn with_reporter(mut self, reporter: Arc<dyn PriceReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Applies one sweep over the whole table.
    pub fn tick(&mut self) -> Result<(), EvolverError> {
        let rng = &mut self.rng;
        self.store.apply_bulk_change(|stock| {
            apply_change(&stock.ticker, stock.price, draw_change(&mut *rng))
        })
    }

    fn next_delay(&mut self) -> Duration {
        let min = self.config.min_tick.as_millis() as u64;
        let max = (self.config.max_tick.as_millis() as u64).max(min);
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    fn report(&self) {
        if self.reporter.enabled() {
            self.reporter.report(&self.store.list());
        }
    }

    /// Runs until `shutdown` is cancelled or a sweep fails.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), EvolverError> {
        info!(
            "Price evolver started, sweeping every {:?} to {:?}",
            self.config.min_tick, self.config.max_tick
        );
        loop {
            self.report();
            let delay = self.next_delay();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Price evolver stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
            self.tick()?;
        }
    }
}
