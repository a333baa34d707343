//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements per-subscriber price feeds. A feed is a lazy, infinite stream of price
// updates read from the price store, either on a fixed interval or only when the price moves.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | PriceFeed      | Creates price streams for listed stocks                    |
// | FeedError      | Errors returned when subscribing                           |
// | deliver        | Pumps a price stream into a sink until cancelled           |
//--------------------------------------------------------------------------------------------------

use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, BoxStream};
use futures::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::models::types::{FeedMode, Price, PriceUpdate};
use crate::domain::services::price_store::PriceStore;

/// Poll period of on-change subscriptions.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest interval a subscription may ask for.
pub const MAX_INTERVAL_SECONDS: u64 = 86_400;

/// A boxed, infinite stream of price updates.
pub type PriceStream = BoxStream<'static, PriceUpdate>;

/// Errors that can occur when subscribing to a price feed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("the stock {0} has not been found")]
    NotFound(String),

    #[error("the interval must be between 1 and 86400 seconds")]
    InvalidInterval,
}

/// Creates price streams backed by the store.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    store: PriceStore,
    poll_interval: Duration,
}

struct FeedState {
    store: PriceStore,
    ticker: String,
    mode: FeedMode,
    interval: Interval,
    last_emitted: Price,
}

impl PriceFeed {
    pub fn new(store: PriceStore) -> Self {
        Self::with_poll_interval(store, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(store: PriceStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Maps the wire `interval_seconds` onto a feed mode. Absent means on-change.
    pub fn mode(&self, interval_seconds: Option<u64>) -> Result<FeedMode, FeedError> {
        match interval_seconds {
            None => Ok(FeedMode::OnChange(self.poll_interval)),
            Some(seconds @ 1..=MAX_INTERVAL_SECONDS) => {
                Ok(FeedMode::Interval(Duration::from_secs(seconds)))
            }
            Some(_) => Err(FeedError::InvalidInterval),
        }
    }

    /// Subscribes to the price of `ticker`.
    ///
    /// The first read happens one period after subscribing. In on-change mode the price at
    /// subscription time is the baseline and is not emitted itself. A zero period, or one too
    /// long to schedule, is an invalid interval.
    pub fn subscribe(&self, ticker: &str, mode: FeedMode) -> Result<PriceStream, FeedError> {
        let baseline = self
            .store
            .price(ticker)
            .map_err(|_| FeedError::NotFound(ticker.to_string()))?;

        let period = mode.period();
        if period.is_zero() {
            return Err(FeedError::InvalidInterval);
        }
        let start = Instant::now()
            .checked_add(period)
            .ok_or(FeedError::InvalidInterval)?;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = FeedState {
            store: self.store.clone(),
            ticker: ticker.to_string(),
            mode,
            interval,
            last_emitted: baseline,
        };

        Ok(stream::unfold(state, next_update).boxed())
    }
}

async fn next_update(mut state: FeedState) -> Option<(PriceUpdate, FeedState)> {
    loop {
        state.interval.tick().await;
        let price = match state.store.price(&state.ticker) {
            Ok(price) => price,
            Err(err) => {
                // stocks are never delisted
                warn!("Price feed for {} lost its stock: {}", state.ticker, err);
                return None;
            }
        };
        let emit = match state.mode {
            FeedMode::Interval(_) => true,
            FeedMode::OnChange(_) => price != state.last_emitted,
        };
        if emit {
            state.last_emitted = price;
            let update = PriceUpdate {
                ticker: state.ticker.clone(),
                price,
                observed_at: Utc::now(),
            };
            return Some((update, state));
        }
    }
}

/// Sends every update of `prices` into `sink` until `cancel` fires or the sink fails.
///
/// Cancellation ends delivery without error. A sink failure is returned and not retried.
pub async fn deliver<K>(
    mut prices: PriceStream,
    mut sink: K,
    cancel: CancellationToken,
) -> Result<usize, K::Error>
where
    K: Sink<PriceUpdate> + Unpin,
{
    let mut delivered = 0;
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => return Ok(delivered),
            update = prices.next() => match update {
                Some(update) => update,
                None => return Ok(delivered),
            },
        };
        debug!("Sending {} {}", update.ticker, update.price);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(delivered),
            sent = sink.send(update) => sent?,
        }
        delivered += 1;
    }
}
