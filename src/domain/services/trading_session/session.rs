//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the trading session: one per client connection, owning one matching
// engine. While active it runs three activities concurrently:
//
// | Activity           | Description                                                     |
// |--------------------|-----------------------------------------------------------------|
// | receive            | Reads client orders one at a time and queues them for matching   |
// | match and emit     | Runs passes on arrival or on a fallback tick, sends executions  |
// | cancellation watch | Closes the session as soon as the controlling token fires       |
//
// The first activity to finish closes the session. Orders still queued at that point are
// abandoned: never executed and never reported.
//
//--------------------------------------------------------------------------------------------------
// ENUMS
//--------------------------------------------------------------------------------------------------
// | Name               | Description                                       | Variants            |
// |--------------------|---------------------------------------------------|---------------------|
// | SessionState       | Protocol state                                    | Open, Active        |
// |                    |                                                   | Closed              |
// |--------------------|---------------------------------------------------|---------------------|
// | CloseReason        | Why the session closed                            | PeerClosed          |
// |                    |                                                   | Cancelled           |
// |                    |                                                   | ReceiveFailed       |
// |                    |                                                   | DeliveryFailed      |
//--------------------------------------------------------------------------------------------------

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::domain::models::types::{Execution, PendingOrder};
use crate::domain::services::matching_engine::MatchingEngine;
use crate::domain::services::price_store::PriceStore;
use crate::domain::services::trading_session::{SessionError, TransportError};

/// Protocol state of a trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet running
    Open,
    /// Receiving orders and emitting executions
    Active,
    /// Terminal
    Closed,
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client ended its order stream
    PeerClosed,
    /// The controlling token was cancelled
    Cancelled,
    /// Reading an order failed
    ReceiveFailed,
    /// Sending an execution failed
    DeliveryFailed,
}

/// Tuning of a trading session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fallback period between passes when no order arrives
    pub pass_interval: Duration,
    /// Capacity of the queue between the receive and match activities
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_millis(250),
            queue_capacity: 64,
        }
    }
}

/// What happened during a session that closed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: CloseReason,
    /// Orders read from the client
    pub received: usize,
    /// Executions delivered to the client
    pub executed: usize,
    /// Orders dropped as invalid
    pub discarded: usize,
    /// Orders still queued when the session closed
    pub abandoned: usize,
}

/// How the active state ended.
enum Ended {
    PeerClosed,
    Cancelled,
    ReceiveFailed(TransportError),
    DeliveryFailed(TransportError),
}

#[derive(Default)]
struct PassStats {
    executed: usize,
    discarded: usize,
}

/// A trading session bound to one client connection.
#[derive(Debug)]
pub struct TradingSession {
    id: Uuid,
    store: PriceStore,
    config: SessionConfig,
    state: SessionState,
}

impl TradingSession {
    pub fn new(store: PriceStore, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            config,
            state: SessionState::Open,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs the session until the client closes its stream, a transport error occurs, or
    /// `cancel` fires.
    ///
    /// End of input and cancellation close the session without error. Receive and delivery
    /// failures are returned as [`SessionError`]. The session is `Closed` in every case.
    pub async fn run<I, O>(
        &mut self,
        inbound: I,
        outbound: O,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, SessionError>
    where
        I: Stream<Item = Result<PendingOrder, TransportError>> + Unpin,
        O: Sink<Execution, Error = TransportError> + Unpin,
    {
        let span = info_span!("trade", session = %self.id);
        self.drive(inbound, outbound, cancel).instrument(span).await
    }

    async fn drive<I, O>(
        &mut self,
        inbound: I,
        outbound: O,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, SessionError>
    where
        I: Stream<Item = Result<PendingOrder, TransportError>> + Unpin,
        O: Sink<Execution, Error = TransportError> + Unpin,
    {
        if self.state != SessionState::Open {
            warn!("Session is {:?}, refusing to run it again", self.state);
            return Err(SessionError::AlreadyClosed);
        }
        info!("Starting trading");
        self.transition(SessionState::Active);

        let (orders_tx, mut orders_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let mut engine = MatchingEngine::new(self.store.clone());
        let mut received = 0;
        let mut stats = PassStats::default();
        let pass_interval = self.config.pass_interval;

        let ended = tokio::select! {
            biased;
            _ = cancel.cancelled() => Ended::Cancelled,
            ended = receive_orders(inbound, &orders_tx, &mut received) => ended,
            ended = match_and_emit(&mut engine, &mut orders_rx, outbound, pass_interval, &mut stats) => ended,
        };

        // orders that never reached the engine are abandoned too
        drop(orders_tx);
        while let Ok(order) = orders_rx.try_recv() {
            engine.submit(order);
        }
        let abandoned = engine.pending();
        self.transition(SessionState::Closed);

        match ended {
            Ended::PeerClosed => {
                info!("Finishing trading, {} orders left unexecuted", abandoned);
                Ok(self.summary(CloseReason::PeerClosed, received, stats, abandoned))
            }
            Ended::Cancelled => {
                info!("Trading cancelled, {} orders left unexecuted", abandoned);
                Ok(self.summary(CloseReason::Cancelled, received, stats, abandoned))
            }
            Ended::ReceiveFailed(err) => {
                error!(
                    "Error while receiving a client's order, {} orders will be canceled: {}",
                    abandoned, err
                );
                Err(SessionError::Receive(err))
            }
            Ended::DeliveryFailed(err) => {
                error!(
                    "Cannot send an executed order, {} orders will be canceled: {}",
                    abandoned, err
                );
                Err(SessionError::Delivery(err))
            }
        }
    }

    fn summary(
        &self,
        reason: CloseReason,
        received: usize,
        stats: PassStats,
        abandoned: usize,
    ) -> SessionSummary {
        SessionSummary {
            reason,
            received,
            executed: stats.executed,
            discarded: stats.discarded,
            abandoned,
        }
    }
}

/// Receive activity: forwards client orders to the match activity.
async fn receive_orders<I>(
    mut inbound: I,
    orders: &mpsc::Sender<PendingOrder>,
    received: &mut usize,
) -> Ended
where
    I: Stream<Item = Result<PendingOrder, TransportError>> + Unpin,
{
    loop {
        match inbound.next().await {
            None | Some(Err(TransportError::Closed)) => return Ended::PeerClosed,
            Some(Err(err)) => return Ended::ReceiveFailed(err),
            Some(Ok(order)) => {
                debug!("Received the order {:?}", order);
                *received += 1;
                if orders.send(order).await.is_err() {
                    // the match activity owns the receiver and only stops with the session
                    return Ended::PeerClosed;
                }
            }
        }
    }
}

/// Match and emit activity: runs a pass whenever orders arrive and on every fallback tick.
async fn match_and_emit<O>(
    engine: &mut MatchingEngine,
    orders: &mut mpsc::Receiver<PendingOrder>,
    mut outbound: O,
    pass_interval: Duration,
    stats: &mut PassStats,
) -> Ended
where
    O: Sink<Execution, Error = TransportError> + Unpin,
{
    let mut ticker = tokio::time::interval(pass_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(order) = orders.recv() => {
                engine.submit(order);
                while let Ok(order) = orders.try_recv() {
                    engine.submit(order);
                }
            }
            _ = ticker.tick() => {}
        }
        if engine.pending() == 0 {
            continue;
        }

        let outcome = engine.run_pass();
        if !outcome.discarded.is_empty() {
            warn!("Invalid orders: {:?} have been ignored", outcome.discarded);
            stats.discarded += outcome.discarded.len();
        }
        for execution in outcome.executions {
            debug!("Sending the execution {:?}", execution);
            if let Err(err) = outbound.send(execution).await {
                return Ended::DeliveryFailed(err);
            }
            stats.executed += 1;
        }
    }
}
