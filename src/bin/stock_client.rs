//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Demo client for the stock exchange. It walks through every endpoint once:
//
// | Step    | Description                                                              |
// |---------|--------------------------------------------------------------------------|
// | list    | Lists the stocks and picks one at random                                 |
// | offer   | Offers TSM, the picked stock and NVO, so rejections show up too          |
// | track   | Follows the picked stock at a fixed interval and averages its price      |
// | trade   | Sends random orders, half of them limited at the average                 |
//--------------------------------------------------------------------------------------------------

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use futures::StreamExt;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use tokio::time::{timeout, Instant};
use tracing::{info, warn, Level};

use mini_exchange::domain::models::types::price_to_decimal;
use mini_exchange::{ExchangeClient, OfferRequest, PendingOrder, Price};

const TRACK_INTERVAL_SECS: u64 = 3;

/// Command line arguments for the demo client
#[derive(Parser, Debug)]
#[command(author, version, about = "Demo client for the stock exchange")]
struct Args {
    /// Exchange URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,

    /// How long to follow the price of the picked stock
    #[arg(long, default_value = "15")]
    track_secs: u64,

    /// How long to wait for executions before giving up
    #[arg(long, default_value = "45")]
    trade_wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    let client = ExchangeClient::new(&args.server)?;

    let stocks = client.list_stocks().await?;
    for stock in &stocks {
        info!("{}: {}", stock.ticker, stock.description);
    }
    let chosen = stocks
        .choose(&mut thread_rng())
        .ok_or_else(|| anyhow!("the exchange lists no stocks"))?
        .ticker
        .clone();
    info!("Picked {}", chosen);

    offer(&client, &chosen).await?;

    let average = track(&client, &chosen, Duration::from_secs(args.track_secs)).await?;
    info!("Average price of {}: {}", chosen, price_to_decimal(average));

    trade(&client, &chosen, average, Duration::from_secs(args.trade_wait_secs)).await
}

async fn offer(client: &ExchangeClient, chosen: &str) -> Result<()> {
    let offers = {
        let mut rng = thread_rng();
        vec![
            OfferRequest::new("TSM", Some("Taiwan Semiconductor Manufacturing"), rng.gen_range(0..70)),
            OfferRequest::new(chosen, None, rng.gen_range(0..70)),
            OfferRequest::new("NVO", Some("Novo Nordisk A/S"), rng.gen_range(0..70)),
        ]
    };

    let summary = client.offer_stocks(&offers).await?;
    for ticker in &summary.listed {
        info!("Listed {}", ticker);
    }
    for rejection in &summary.rejected {
        info!("Rejected {}: {}", rejection.ticker, rejection.reason);
    }
    Ok(())
}

async fn track(client: &ExchangeClient, ticker: &str, window: Duration) -> Result<Price> {
    let mut prices = client.subscribe_price(ticker, Some(TRACK_INTERVAL_SECS)).await?;
    let deadline = Instant::now() + window;

    let mut seen: Vec<Price> = Vec::new();
    while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, prices.next()).await {
        let frame = frame?;
        info!(
            "{} is at {} ({})",
            frame.ticker,
            price_to_decimal(frame.price),
            frame.observed_at.format("%H:%M:%S")
        );
        seen.push(frame.price);
    }

    if seen.is_empty() {
        return Err(anyhow!("no price of {} arrived within {:?}", ticker, window));
    }
    Ok(seen.iter().sum::<Price>() / seen.len() as Price)
}

async fn trade(client: &ExchangeClient, ticker: &str, average: Price, wait: Duration) -> Result<()> {
    let orders: Vec<PendingOrder> = {
        let mut rng = thread_rng();
        let count = rng.gen_range(3..=10);
        (0..count)
            .map(|_| {
                let amount = rng.gen_range(1..=10) * if rng.gen_bool(0.5) { 1 } else { -1 };
                if rng.gen_bool(0.5) {
                    PendingOrder::limit(ticker, amount, average)
                } else {
                    PendingOrder::market(ticker, amount)
                }
            })
            .collect()
    };

    let mut connection = client.trade().await?;
    for order in &orders {
        match order.limit_price {
            Some(limit) => info!(
                "Sending {} {} limited at {}",
                order.amount,
                order.ticker,
                price_to_decimal(limit)
            ),
            None => info!("Sending {} {} at market", order.amount, order.ticker),
        }
        connection.submit(order).await?;
    }

    let deadline = Instant::now() + wait;
    let mut executed = 0;
    while executed < orders.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, connection.next_execution()).await {
            Ok(Ok(Some(execution))) => {
                executed += 1;
                info!(
                    "Executed {} {} at {}",
                    execution.amount,
                    execution.ticker,
                    price_to_decimal(execution.executed_price)
                );
            }
            Ok(Ok(None)) => {
                warn!("The exchange closed the session");
                break;
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                info!("{} orders were not executed in time", orders.len() - executed);
                break;
            }
        }
    }

    connection.finish().await
}
