use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::api::dto::{ListStocksResponse, PriceFrame, StockSummary};
use crate::domain::models::types::{Execution, OfferRequest, OfferSummary, PendingOrder};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client for the exchange's HTTP and WebSocket API
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    /// HTTP client
    client: Client,

    /// Base URL for the API, e.g. `http://127.0.0.1:8080`
    base_url: String,
}

impl ExchangeClient {
    /// Creates a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn ws_url(&self, path: &str) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{}{}", base, path)
    }

    /// Lists every stock, sorted by ticker
    pub async fn list_stocks(&self) -> Result<Vec<StockSummary>> {
        let url = format!("{}/stocks", self.base_url);
        let resp = self.client.get(&url).send().await?;

        match resp.status() {
            StatusCode::OK => Ok(resp.json::<ListStocksResponse>().await?.stocks),
            status => {
                let error_text = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
                Err(anyhow!("Failed to list stocks: {} - {}", status, error_text))
            }
        }
    }

    /// Offers a batch of stocks for listing
    pub async fn offer_stocks(&self, offers: &[OfferRequest]) -> Result<OfferSummary> {
        let url = format!("{}/stocks/offer", self.base_url);
        let resp = self.client.post(&url).json(offers).send().await?;

        match resp.status() {
            StatusCode::OK => Ok(resp.json::<OfferSummary>().await?),
            status => {
                let error_text = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
                Err(anyhow!("Failed to offer stocks: {} - {}", status, error_text))
            }
        }
    }

    /// Subscribes to the price of `ticker`, on change when `interval_seconds` is `None`
    pub async fn subscribe_price(
        &self,
        ticker: &str,
        interval_seconds: Option<u64>,
    ) -> Result<BoxStream<'static, Result<PriceFrame>>> {
        let mut url = self.ws_url(&format!("/stocks/{}/price", ticker));
        if let Some(seconds) = interval_seconds {
            url.push_str(&format!("?interval_seconds={}", seconds));
        }
        let (socket, _) = connect_async(url.as_str()).await?;
        debug!("Subscribed to {}", url);

        let prices = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => {
                    Some(serde_json::from_str::<PriceFrame>(&text).map_err(anyhow::Error::from))
                }
                Ok(_) => None,
                Err(err) => Some(Err(anyhow::Error::from(err))),
            }
        });
        Ok(prices.boxed())
    }

    /// Opens a trading session
    pub async fn trade(&self) -> Result<TradeConnection> {
        let url = self.ws_url("/trade");
        let (socket, _) = connect_async(url.as_str()).await?;
        let (sender, receiver) = socket.split();
        Ok(TradeConnection { sender, receiver })
    }
}

/// Both halves of an open trading session
pub struct TradeConnection {
    sender: SplitSink<Socket, Message>,
    receiver: SplitStream<Socket>,
}

impl TradeConnection {
    /// Submits one order
    pub async fn submit(&mut self, order: &PendingOrder) -> Result<()> {
        let text = serde_json::to_string(order)?;
        self.sender.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Waits for the next execution. `None` once the server closed the session.
    pub async fn next_execution(&mut self) -> Result<Option<Execution>> {
        while let Some(message) = self.receiver.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Ends the order stream, which closes the session on the server
    pub async fn finish(mut self) -> Result<()> {
        self.sender.send(Message::Close(None)).await?;
        Ok(())
    }
}
