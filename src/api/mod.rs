//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the exchange's HTTP and WebSocket API using Axum.
// Listing and offering stocks are plain JSON requests; price feeds and trading sessions are
// WebSocket upgrades.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | API            | Main API structure coordinating routes and services        |
// | Routes         | Handler functions for API endpoints                        |
// | States         | Shared application state                                   |
// | DTOs           | Data transfer objects for API requests/responses           |
// | WS             | Adapters between sockets and domain streams                |
// | Client         | HTTP and WebSocket client for the API                      |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                      | Key Methods       |
// |----------------|--------------------------------------------------|-------------------|
// | AppState       | Shared application state                         | new               |
// | Api            | Main API structure                               | routes, serve     |
//--------------------------------------------------------------------------------------------------

mod routes;
mod dto;
mod error;
mod ws;
pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    Extension,
    routing::{get, post},
    http::{Method, header},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::domain::services::listing::ListingService;
use crate::domain::services::price_feed::PriceFeed;
use crate::domain::services::price_store::PriceStore;
use crate::domain::services::trading_session::SessionConfig;

pub use client::{ExchangeClient, TradeConnection};
pub use error::{ApiError, ApiResult};
pub use dto::*;

/// Shared application state accessible by all handlers
pub struct AppState {
    /// The stock table shared by every service
    pub store: PriceStore,
    /// Admits new stocks
    pub listing: ListingService,
    /// Creates price streams
    pub feed: PriceFeed,
    /// Applied to every new trading session
    pub session_config: SessionConfig,
    /// Cancelled on shutdown; every feed and session runs under a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new application state over an existing store
    pub fn new(store: PriceStore, config: &Config, shutdown: CancellationToken) -> Self {
        Self {
            listing: ListingService::new(store.clone()),
            feed: PriceFeed::with_poll_interval(store.clone(), config.feed_poll_interval),
            session_config: config.session(),
            store,
            shutdown,
        }
    }
}

/// Main API structure
pub struct Api {
    /// API address
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl Api {
    /// Creates a new API instance
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            state: Arc::new(state),
        }
    }

    /// Creates all routes for the API
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            // Health check
            .route("/health", get(routes::health))

            // Listing
            .route("/stocks", get(routes::list_stocks))
            .route("/stocks/offer", post(routes::offer_stocks))

            // Streams
            .route("/stocks/:ticker/price", get(routes::subscribe_price))
            .route("/trade", get(routes::trade))

            // Attach application state
            .layer(Extension(self.state.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Binds the configured address and serves until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` is cancelled
    pub async fn serve_with_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let app = self.routes();

        info!("API listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("API stopped");
        Ok(())
    }
}
