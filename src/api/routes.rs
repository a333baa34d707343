//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                            | Return Type         |
// |-----------------------|----------------------------------------|---------------------|
// | health                | Health check endpoint                  | Response            |
// | list_stocks           | List every stock, sorted by ticker     | Json                |
// | offer_stocks          | List a batch of new stocks             | Json                |
// | subscribe_price       | Stream the price of one stock          | ApiResult<Response> |
// | trade                 | Open a trading session                 | Response            |
//--------------------------------------------------------------------------------------------------

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Extension, Path, Query,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use super::{ws, ApiError, ApiResult, AppState, ListStocksResponse, SubscribeQuery};
use crate::domain::models::types::{OfferRequest, OfferSummary};
use crate::domain::services::price_feed::{self, PriceStream};
use crate::domain::services::trading_session::TradingSession;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// List every stock, sorted by ticker
pub async fn list_stocks(Extension(state): Extension<Arc<AppState>>) -> Json<ListStocksResponse> {
    Json(ListStocksResponse::from_stocks(state.store.list()))
}

/// List a batch of new stocks in submission order
pub async fn offer_stocks(
    Extension(state): Extension<Arc<AppState>>,
    Json(offers): Json<Vec<OfferRequest>>,
) -> Json<OfferSummary> {
    let offers = stream::iter(offers.into_iter().map(Ok::<_, Infallible>));
    let summary = match state.listing.offer_all(offers).await {
        Ok(summary) => summary,
        Err(never) => match never {},
    };
    Json(summary)
}

/// Stream the price of one stock over a WebSocket
///
/// The ticker and interval are validated before the upgrade, so an unknown stock is answered
/// with a plain 404.
pub async fn subscribe_price(
    Extension(state): Extension<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<SubscribeQuery>,
    upgrade: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let mode = state.feed.mode(query.interval_seconds)?;
    let prices = state.feed.subscribe(&ticker, mode)?;
    let upgrade = upgrade
        .ok_or_else(|| ApiError::BadRequest("a WebSocket upgrade is required".to_string()))?;

    info!("Subscribed to {} with {:?}", ticker, mode);
    Ok(upgrade.on_upgrade(move |socket| stream_prices(socket, prices, state, ticker)))
}

async fn stream_prices(socket: WebSocket, prices: PriceStream, state: Arc<AppState>, ticker: String) {
    let (sender, receiver) = socket.split();
    let cancel = state.shutdown.child_token();

    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            ws::closed(receiver).await;
            cancel.cancel();
        }
    });

    match price_feed::deliver(prices, ws::price_sink(sender), cancel.clone()).await {
        Ok(delivered) => debug!("Price feed for {} ended after {} updates", ticker, delivered),
        Err(err) => warn!("Cannot send the price of {}: {}", ticker, err),
    }
    cancel.cancel();
    watcher.abort();
}

/// Open a trading session over a WebSocket
pub async fn trade(
    Extension(state): Extension<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let mut session = TradingSession::new(state.store.clone(), state.session_config.clone());

    let result = session
        .run(
            ws::order_stream(receiver),
            ws::execution_sink(sender),
            state.shutdown.child_token(),
        )
        .await;
    match result {
        Ok(summary) => info!("Session {} closed: {:?}", session.id(), summary),
        Err(err) => warn!("Session {} failed: {}", session.id(), err),
    }
}
