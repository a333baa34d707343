use thiserror::Error;

pub mod matching_engine;

/// Re-export key types for convenience
pub use self::matching_engine::{DiscardedOrder, MatchDecision, MatchingEngine, PassOutcome};

/// Reasons an order is discarded by a pass instead of being executed or requeued.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOrder {
    /// Orders must buy or sell a nonzero amount
    #[error("order amount is zero")]
    ZeroAmount,

    /// The order references a stock that is not listed
    #[error("order references an unlisted stock")]
    UnknownTicker,
}
