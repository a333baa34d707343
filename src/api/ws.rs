//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Adapters between axum WebSocket halves and the typed streams the domain services consume.
//
// | Function         | Description                                                     |
// |------------------|-----------------------------------------------------------------|
// | order_stream     | Decodes client text frames into pending orders                  |
// | execution_sink   | Encodes executions into text frames                             |
// | price_sink       | Encodes price updates into text frames                          |
// | closed           | Resolves once the client closes its side of the socket          |
//--------------------------------------------------------------------------------------------------

use axum::extract::ws::{Message, WebSocket};
use futures::future;
use futures::stream::{BoxStream, SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;

use super::dto::PriceFrame;
use crate::domain::models::types::{Execution, PendingOrder, PriceUpdate};
use crate::domain::services::trading_session::TransportError;

type WsSink = SplitSink<WebSocket, Message>;

fn encode<T: Serialize>(value: &T) -> Result<Message, TransportError> {
    serde_json::to_string(value)
        .map(Message::Text)
        .map_err(|err| TransportError::Decode(err.to_string()))
}

fn decode_order(message: Result<Message, axum::Error>) -> Option<Result<PendingOrder, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(
            serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string())),
        ),
        Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
        // ping, pong and binary frames carry no orders
        Ok(_) => None,
        Err(err) => Some(Err(TransportError::Io(err.to_string()))),
    }
}

/// Turns the receiving half of a trade socket into a stream of orders.
///
/// A close frame yields [`TransportError::Closed`], which a session treats as end of input.
pub fn order_stream(
    receiver: SplitStream<WebSocket>,
) -> BoxStream<'static, Result<PendingOrder, TransportError>> {
    receiver
        .filter_map(|message| future::ready(decode_order(message)))
        .boxed()
}

/// Turns the sending half of a trade socket into a sink of executions.
pub fn execution_sink(sender: WsSink) -> impl Sink<Execution, Error = TransportError> + Unpin {
    sender
        .sink_map_err(|err| TransportError::Io(err.to_string()))
        .with(|execution: Execution| future::ready(encode(&execution)))
}

/// Turns the sending half of a feed socket into a sink of price updates.
pub fn price_sink(sender: WsSink) -> impl Sink<PriceUpdate, Error = TransportError> + Unpin {
    sender
        .sink_map_err(|err| TransportError::Io(err.to_string()))
        .with(|update: PriceUpdate| future::ready(encode(&PriceFrame::from(update))))
}

/// Drains the receiving half of a feed socket and returns once the client is gone.
pub async fn closed(mut receiver: SplitStream<WebSocket>) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
