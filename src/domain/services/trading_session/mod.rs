use thiserror::Error;

pub mod session;

pub use self::session::{CloseReason, SessionConfig, SessionState, SessionSummary, TradingSession};

/// Failures of the connection a session runs over.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer went away
    #[error("connection closed")]
    Closed,

    /// A message could not be decoded
    #[error("malformed message: {0}")]
    Decode(String),

    /// Any other send or receive failure
    #[error("transport failure: {0}")]
    Io(String),
}

/// Errors that end a trading session. Orders still queued are abandoned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unable to receive an order: {0}")]
    Receive(#[source] TransportError),

    #[error("unable to send an execution: {0}")]
    Delivery(#[source] TransportError),

    /// A session runs once; a closed one cannot be reused
    #[error("the session has already run")]
    AlreadyClosed,
}
