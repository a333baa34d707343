//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the authoritative table of listed stocks and their prices.
// Every read and write goes through a single table-wide lock so that a whole-table price sweep
// is never observed half-applied.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | PriceStore     | Cloneable handle to the shared stock table                 |
// | StoreError     | Errors returned by store operations                        |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                       | Key Methods         |
// |----------------|---------------------------------------------------|---------------------|
// | PriceStore     | Shared, lock-protected stock table                | get, list, insert   |
// |                |                                                   | apply_price_change  |
// |                |                                                   | apply_bulk_change   |
// |                |                                                   | snapshot            |
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::domain::models::types::{Price, Stock};

/// Errors that can occur within the price store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No stock is listed under the ticker
    #[error("the stock {0} has not been found")]
    NotFound(String),

    /// A stock is already listed under the ticker
    #[error("the stock {0} is already listed")]
    AlreadyExists(String),
}

/// Shared table of listed stocks.
///
/// Clones share the same table. Callers only ever receive owned copies of the rows.
#[derive(Debug, Clone, Default)]
pub struct PriceStore {
    stocks: Arc<RwLock<BTreeMap<String, Stock>>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stock listed under `ticker`.
    pub fn get(&self, ticker: &str) -> Result<Stock, StoreError> {
        self.stocks
            .read()
            .get(ticker)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(ticker.to_string()))
    }

    /// Returns the current price of `ticker`.
    pub fn price(&self, ticker: &str) -> Result<Price, StoreError> {
        self.stocks
            .read()
            .get(ticker)
            .map(|stock| stock.price)
            .ok_or_else(|| StoreError::NotFound(ticker.to_string()))
    }

    /// Returns every listed stock, sorted by ticker.
    pub fn list(&self) -> Vec<Stock> {
        self.stocks.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.read().is_empty()
    }

    /// Lists a new stock. The duplicate check and the insert happen under one write lock.
    pub fn insert(
        &self,
        ticker: &str,
        description: &str,
        initial_price: Price,
    ) -> Result<(), StoreError> {
        let mut stocks = self.stocks.write();
        if stocks.contains_key(ticker) {
            return Err(StoreError::AlreadyExists(ticker.to_string()));
        }
        stocks.insert(
            ticker.to_string(),
            Stock::new(ticker, description, initial_price),
        );
        Ok(())
    }

    /// Sets the price of a single stock.
    pub fn apply_price_change(&self, ticker: &str, new_price: Price) -> Result<(), StoreError> {
        let mut stocks = self.stocks.write();
        let stock = stocks
            .get_mut(ticker)
            .ok_or_else(|| StoreError::NotFound(ticker.to_string()))?;
        stock.price = new_price;
        Ok(())
    }

    /// Recomputes every price in one sweep under the write lock.
    ///
    /// All new prices are computed before any row is written, so an error from `reprice`
    /// leaves the table untouched.
    pub fn apply_bulk_change<F, E>(&self, mut reprice: F) -> Result<(), E>
    where
        F: FnMut(&Stock) -> Result<Price, E>,
    {
        let mut stocks = self.stocks.write();
        let new_prices = stocks
            .values()
            .map(|stock| reprice(stock))
            .collect::<Result<Vec<_>, E>>()?;
        for (stock, price) in stocks.values_mut().zip(new_prices) {
            stock.price = price;
        }
        Ok(())
    }

    /// Reads the prices of the given tickers under a single read lock.
    ///
    /// Unknown tickers are absent from the result.
    pub fn snapshot<'a, I>(&self, tickers: I) -> HashMap<String, Price>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let stocks = self.stocks.read();
        tickers
            .into_iter()
            .filter_map(|ticker| stocks.get(ticker).map(|stock| (ticker.to_string(), stock.price)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_aapl() -> PriceStore {
        let store = PriceStore::new();
        store.insert("AAPL", "Apple Inc. Common Stock", 9_000).unwrap();
        store
    }

    #[test]
    fn test_insert_and_get() {
        let store = store_with_aapl();
        let stock = store.get("AAPL").unwrap();
        assert_eq!(stock.price, 9_000);
        assert_eq!(stock.description, "Apple Inc. Common Stock");
    }

    #[test]
    fn test_tickers_are_case_sensitive() {
        let store = store_with_aapl();
        assert_eq!(store.get("aapl"), Err(StoreError::NotFound("aapl".to_string())));
        store.insert("aapl", "", 1).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_keeps_first() {
        let store = store_with_aapl();
        let err = store.insert("AAPL", "Another description", 1).unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists("AAPL".to_string()));

        let stock = store.get("AAPL").unwrap();
        assert_eq!(stock.description, "Apple Inc. Common Stock");
        assert_eq!(stock.price, 9_000);
    }

    #[test]
    fn test_list_is_sorted_by_ticker() {
        let store = PriceStore::new();
        for ticker in ["PEP", "AAPL", "JNJ"] {
            store.insert(ticker, "", 100).unwrap();
        }
        let tickers: Vec<_> = store.list().into_iter().map(|s| s.ticker).collect();
        assert_eq!(tickers, vec!["AAPL", "JNJ", "PEP"]);
    }

    #[test]
    fn test_apply_price_change() {
        let store = store_with_aapl();
        store.apply_price_change("AAPL", 8_400).unwrap();
        assert_eq!(store.price("AAPL").unwrap(), 8_400);
        assert!(store.apply_price_change("MSFT", 1).is_err());
    }

    #[test]
    fn test_bulk_change_is_all_or_nothing() {
        let store = store_with_aapl();
        store.insert("PEP", "", 5_000).unwrap();

        let result: Result<(), &str> = store.apply_bulk_change(|stock| {
            if stock.ticker == "PEP" { Err("boom") } else { Ok(1) }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(store.price("AAPL").unwrap(), 9_000);

        store
            .apply_bulk_change::<_, ()>(|stock| Ok(stock.price / 2))
            .unwrap();
        assert_eq!(store.price("AAPL").unwrap(), 4_500);
        assert_eq!(store.price("PEP").unwrap(), 2_500);
    }

    #[test]
    fn test_snapshot_skips_unknown_tickers() {
        let store = store_with_aapl();
        let snapshot = store.snapshot(["AAPL", "NOPE"]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["AAPL"], 9_000);
    }

    #[test]
    fn test_clones_share_the_table() {
        let store = PriceStore::new();
        let other = store.clone();
        other.insert("CSCO", "", 100).unwrap();
        assert!(store.get("CSCO").is_ok());
    }
}
