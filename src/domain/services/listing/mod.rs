//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module admits new stocks into the price store. Offers are processed one at a time in
// submission order and each one is accepted or rejected on its own.
//
// | Component        | Description                                              |
// |------------------|----------------------------------------------------------|
// | ListingService   | Validates offers and inserts them into the store         |
// | ListingError     | Per-offer rejection reasons                              |
// | SEED_STOCKS      | Stocks listed at startup                                 |
//--------------------------------------------------------------------------------------------------

use futures::{Stream, StreamExt};
use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::domain::models::types::{OfferRequest, OfferSummary, Rejection};
use crate::domain::services::price_store::PriceStore;

/// Stocks listed at startup, as (ticker, description).
pub const SEED_STOCKS: [(&str, &str); 4] = [
    ("AAPL", "Apple Inc. Common Stock"),
    ("PEP", "PepsiCo, Inc. Common Stock"),
    ("JNJ", "Johnson & Johnson Common Stock"),
    ("CSCO", "Cisco Systems, Inc. Common Stock"),
];

/// Reasons an offer is not listed. The messages are reported to the client verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("The stock with such ticker is already listed")]
    AlreadyExists,

    #[error("Cannot list the stock with zero price")]
    InvalidInitialPrice,
}

/// Admits new stocks into the store.
#[derive(Debug, Clone)]
pub struct ListingService {
    store: PriceStore,
}

impl ListingService {
    pub fn new(store: PriceStore) -> Self {
        Self { store }
    }

    /// Lists a single stock.
    ///
    /// A duplicate ticker is reported before a zero price. The store's insert re-checks the
    /// ticker under its write lock, so two concurrent offers for the same ticker never both win.
    pub fn offer(&self, request: &OfferRequest) -> Result<(), ListingError> {
        if self.store.get(&request.ticker).is_ok() {
            return Err(ListingError::AlreadyExists);
        }
        if request.initial_price == 0 {
            return Err(ListingError::InvalidInitialPrice);
        }
        let description = request.description.as_deref().unwrap_or_default();
        self.store
            .insert(&request.ticker, description, request.initial_price)
            .map_err(|_| ListingError::AlreadyExists)
    }

    /// Processes a stream of offers in order.
    ///
    /// Rejections are collected in the summary. A failure of the stream itself aborts the batch;
    /// offers listed before the failure stay listed.
    pub async fn offer_all<S, E>(&self, offers: S) -> Result<OfferSummary, E>
    where
        S: Stream<Item = Result<OfferRequest, E>>,
    {
        let mut offers = std::pin::pin!(offers);
        let mut summary = OfferSummary::default();
        while let Some(request) = offers.next().await {
            let request = request?;
            match self.offer(&request) {
                Ok(()) => {
                    info!("Listed {} at {}", request.ticker, request.initial_price);
                    summary.listed.push(request.ticker);
                }
                Err(reason) => {
                    info!("Rejected {}: {}", request.ticker, reason);
                    summary.rejected.push(Rejection {
                        ticker: request.ticker,
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Lists the seed stocks at a random price of 80.00 to 119.00.
    pub fn list_seed_stocks<R: Rng>(&self, rng: &mut R) -> OfferSummary {
        let mut summary = OfferSummary::default();
        for (ticker, description) in SEED_STOCKS {
            let request = OfferRequest::new(ticker, Some(description), rng.gen_range(80..120) * 100);
            match self.offer(&request) {
                Ok(()) => summary.listed.push(request.ticker),
                Err(reason) => summary.rejected.push(Rejection {
                    ticker: request.ticker,
                    reason: reason.to_string(),
                }),
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::convert::Infallible;

    fn service() -> (ListingService, PriceStore) {
        let store = PriceStore::new();
        (ListingService::new(store.clone()), store)
    }

    fn ok_stream(offers: Vec<OfferRequest>) -> impl Stream<Item = Result<OfferRequest, Infallible>> {
        stream::iter(offers.into_iter().map(Ok))
    }

    #[test]
    fn test_offer_lists_stock_without_description() {
        let (listing, store) = service();
        listing.offer(&OfferRequest::new("TSM", None, 4_200)).unwrap();
        let stock = store.get("TSM").unwrap();
        assert_eq!(stock.description, "");
        assert_eq!(stock.price, 4_200);
    }

    #[test]
    fn test_second_offer_of_same_ticker_is_rejected() {
        let (listing, store) = service();
        listing.offer(&OfferRequest::new("TSM", Some("first"), 4_200)).unwrap();
        let err = listing
            .offer(&OfferRequest::new("TSM", Some("second"), 10))
            .unwrap_err();
        assert_eq!(err, ListingError::AlreadyExists);

        let stock = store.get("TSM").unwrap();
        assert_eq!(stock.description, "first");
        assert_eq!(stock.price, 4_200);
    }

    #[test]
    fn test_zero_price_is_rejected_without_touching_store() {
        let (listing, store) = service();
        let err = listing.offer(&OfferRequest::new("NVO", None, 0)).unwrap_err();
        assert_eq!(err, ListingError::InvalidInitialPrice);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_is_reported_before_zero_price() {
        let (listing, _) = service();
        listing.offer(&OfferRequest::new("NVO", None, 1)).unwrap();
        let err = listing.offer(&OfferRequest::new("NVO", None, 0)).unwrap_err();
        assert_eq!(err, ListingError::AlreadyExists);
    }

    #[tokio::test]
    async fn test_batch_continues_after_rejection() {
        let (listing, store) = service();
        store.insert("AAPL", "", 9_000).unwrap();

        let summary = listing
            .offer_all(ok_stream(vec![
                OfferRequest::new("TSM", None, 55),
                OfferRequest::new("AAPL", None, 10),
                OfferRequest::new("NVO", None, 0),
                OfferRequest::new("ASML", Some("ASML Holding"), 61),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.listed, vec!["TSM", "ASML"]);
        assert_eq!(
            summary.rejected,
            vec![
                Rejection {
                    ticker: "AAPL".to_string(),
                    reason: "The stock with such ticker is already listed".to_string(),
                },
                Rejection {
                    ticker: "NVO".to_string(),
                    reason: "Cannot list the stock with zero price".to_string(),
                },
            ]
        );
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_failure_aborts_batch() {
        let (listing, store) = service();
        let offers = stream::iter(vec![
            Ok(OfferRequest::new("TSM", None, 55)),
            Err("connection reset"),
            Ok(OfferRequest::new("NVO", None, 10)),
        ]);
        let err = listing.offer_all(offers).await.unwrap_err();
        assert_eq!(err, "connection reset");
        assert!(store.get("TSM").is_ok());
        assert!(store.get("NVO").is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_offers_for_same_ticker_list_once() {
        let (listing, store) = service();
        let mut handles = Vec::new();
        for i in 0..16 {
            let listing = listing.clone();
            handles.push(tokio::spawn(async move {
                listing.offer(&OfferRequest::new("RACE", None, 100 + i))
            }));
        }
        let mut listed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                listed += 1;
            }
        }
        assert_eq!(listed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_seed_stocks_are_listed_in_range() {
        let (listing, store) = service();
        let summary = listing.list_seed_stocks(&mut StdRng::seed_from_u64(7));
        assert_eq!(summary.listed.len(), SEED_STOCKS.len());
        for stock in store.list() {
            assert!((8_000..=11_900).contains(&stock.price));
            assert_eq!(stock.price % 100, 0);
        }

        // seeding twice rejects every stock
        let again = listing.list_seed_stocks(&mut StdRng::seed_from_u64(7));
        assert!(again.listed.is_empty());
        assert_eq!(again.rejected.len(), SEED_STOCKS.len());
    }
}
