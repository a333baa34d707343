//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                 | Description                               | Key Methods         |
// |----------------------|-------------------------------------------|---------------------|
// | StockSummary         | Listed stock without its price            | from                |
// | ListStocksResponse   | Response of the stock listing             | from_stocks         |
// | SubscribeQuery       | Query of a price subscription             |                     |
// | PriceFrame           | One price emission on the feed socket     | from                |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::types::{Price, PriceUpdate, Stock};

/// A listed stock as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub ticker: String,
    pub description: String,
}

impl From<Stock> for StockSummary {
    fn from(stock: Stock) -> Self {
        Self {
            ticker: stock.ticker,
            description: stock.description,
        }
    }
}

/// Response for the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListStocksResponse {
    /// Listed stocks sorted by ticker
    pub stocks: Vec<StockSummary>,
}

impl ListStocksResponse {
    pub fn from_stocks(stocks: Vec<Stock>) -> Self {
        Self {
            stocks: stocks.into_iter().map(StockSummary::from).collect(),
        }
    }
}

/// Query parameters of a price subscription
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubscribeQuery {
    /// Seconds between emissions; absent means emit on change
    pub interval_seconds: Option<u64>,
}

/// A single price emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFrame {
    pub ticker: String,
    /// Fixed-point minor units
    pub price: Price,
    /// When the price was read from the store
    pub observed_at: DateTime<Utc>,
}

impl From<PriceUpdate> for PriceFrame {
    fn from(update: PriceUpdate) -> Self {
        Self {
            ticker: update.ticker,
            price: update.price,
            observed_at: update.observed_at,
        }
    }
}
