pub mod listing;
pub mod matching_engine;
pub mod price_evolver;
pub mod price_feed;
pub mod price_store;
pub mod trading_session;
