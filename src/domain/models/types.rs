//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the core data types shared by the exchange services: listed stocks,
// pending orders, executions, price updates and the listing request/response shapes.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | CONSTANTS          | Fixed-point price convention.                                    |
// | ENUMS              | Feed delivery modes.                                             |
// | STRUCTS            | Stocks, orders, executions, price updates, listing results.      |
// | TESTS              | Unit tests for the defined types.                                |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
//  CONSTANTS
//--------------------------------------------------------------------------------------------------

/// Number of decimal digits carried by every [`Price`].
pub const PRICE_SCALE: u32 = 2;

/// A price in fixed-point minor units (hundredths of a currency unit).
pub type Price = u64;

/// Converts a fixed-point price into a decimal for display.
pub fn price_to_decimal(price: Price) -> Decimal {
    Decimal::from(price) / Decimal::from(10u64.pow(PRICE_SCALE))
}

//--------------------------------------------------------------------------------------------------
//  ENUMS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                         |
// |---------------|-----------------------------------------------------|
// | FeedMode      | How a price subscription decides when to emit.      |
//--------------------------------------------------------------------------------------------------

/// Delivery policy of a price subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Emit on every tick, whether or not the price moved.
    Interval(Duration),
    /// Poll at the given period and emit only when the price differs from the last emission.
    OnChange(Duration),
}

impl FeedMode {
    /// The period between two reads of the price store.
    pub fn period(&self) -> Duration {
        match self {
            Self::Interval(period) | Self::OnChange(period) => *period,
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                          |
// |-----------------|------------------------------------------------------|
// | Stock           | A listed stock and its current price.                |
// | PendingOrder    | An order waiting in a matching engine queue.         |
// | Execution       | A matched order with its execution price.            |
// | PriceUpdate     | One emission of a price feed.                        |
// | OfferRequest    | A request to list a new stock.                       |
// | Rejection       | A refused offer and the reason.                      |
// | OfferSummary    | Outcome of a batch of offers.                        |
//--------------------------------------------------------------------------------------------------

/// A listed stock. The ticker and description never change after listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    /// Unique, case-sensitive identifier
    pub ticker: String,
    /// Free-form description, possibly empty
    pub description: String,
    /// Current price in minor units
    pub price: Price,
}

impl Stock {
    pub fn new(ticker: impl Into<String>, description: impl Into<String>, price: Price) -> Self {
        Self {
            ticker: ticker.into(),
            description: description.into(),
            price,
        }
    }
}

/// An order submitted on a trading session.
///
/// A positive amount buys, a negative amount sells. Without a limit price the order is a
/// market order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub ticker: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Price>,
}

impl PendingOrder {
    /// Creates a market order.
    pub fn market(ticker: impl Into<String>, amount: i64) -> Self {
        Self {
            ticker: ticker.into(),
            amount,
            limit_price: None,
        }
    }

    /// Creates a limit order.
    pub fn limit(ticker: impl Into<String>, amount: i64, limit_price: Price) -> Self {
        Self {
            ticker: ticker.into(),
            amount,
            limit_price: Some(limit_price),
        }
    }

    pub fn is_buy(&self) -> bool {
        self.amount > 0
    }

    pub fn is_sell(&self) -> bool {
        self.amount < 0
    }
}

/// A matched order. The amount is copied verbatim from the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub ticker: String,
    pub amount: i64,
    /// Snapshot price of the pass that matched the order
    pub executed_price: Price,
}

/// A single emission of a price feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub ticker: String,
    pub price: Price,
    /// Time the price was read from the store
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

/// A request to list a new stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub initial_price: Price,
}

impl OfferRequest {
    pub fn new(ticker: impl Into<String>, description: Option<&str>, initial_price: Price) -> Self {
        Self {
            ticker: ticker.into(),
            description: description.map(str::to_string),
            initial_price,
        }
    }
}

/// An offer that was not listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub ticker: String,
    pub reason: String,
}

/// Result of processing a batch of offers, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSummary {
    pub listed: Vec<String>,
    pub rejected: Vec<Rejection>,
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------
