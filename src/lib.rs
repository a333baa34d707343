// Expose the modules
pub mod api;
pub mod config;
pub mod domain;

// Re-export key types for easier usage
pub use api::{Api, AppState, ExchangeClient, TradeConnection};
pub use config::{Config, ConfigError};
pub use domain::models::types::{
    Execution, FeedMode, OfferRequest, OfferSummary, PendingOrder, Price, PriceUpdate, Rejection,
    Stock, PRICE_SCALE,
};
pub use domain::services::listing::{ListingError, ListingService};
pub use domain::services::matching_engine::{InvalidOrder, MatchingEngine};
pub use domain::services::price_evolver::{EvolverConfig, EvolverError, PriceEvolver};
pub use domain::services::price_feed::{FeedError, PriceFeed};
pub use domain::services::price_store::{PriceStore, StoreError};
pub use domain::services::trading_session::{
    SessionConfig, SessionError, SessionSummary, TradingSession, TransportError,
};
