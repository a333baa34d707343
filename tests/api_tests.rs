//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module contains integration tests for the HTTP side of the API.
// It drives the router directly and verifies status codes and bodies.
//--------------------------------------------------------------------------------------------------

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use hyper::Response;
use serde_json::{json, Value, from_slice};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use mini_exchange::{Api, AppState, Config, PriceStore};

/// Sets up a test router over a store holding AAPL at 90.00 and PEP at 110.00.
/// Returns the router and the store.
fn setup_test_router() -> (Router, PriceStore) {
    let store = PriceStore::new();
    store.insert("AAPL", "Apple Inc. Common Stock", 9_000).unwrap();
    store.insert("PEP", "PepsiCo, Inc. Common Stock", 11_000).unwrap();

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let state = AppState::new(store.clone(), &Config::default(), CancellationToken::new());
    let api = Api::new(addr, state);

    (api.routes(), store)
}

/// Helper to parse JSON responses
async fn parse_json_response(response: Response<Body>) -> Value {
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    from_slice(&body_bytes).unwrap()
}

fn offer_request(body: Value) -> Request<Body> {
    Request::post("/stocks/offer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_json_response(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_list_stocks_sorted_without_prices() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(Request::get("/stocks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        parse_json_response(response).await,
        json!({
            "stocks": [
                {"ticker": "AAPL", "description": "Apple Inc. Common Stock"},
                {"ticker": "PEP", "description": "PepsiCo, Inc. Common Stock"},
            ]
        })
    );
}

#[tokio::test]
async fn test_list_stocks_on_empty_exchange() {
    let state = AppState::new(PriceStore::new(), &Config::default(), CancellationToken::new());
    let app = Api::new(SocketAddr::from(([127, 0, 0, 1], 0)), state).routes();

    let response = app
        .oneshot(Request::get("/stocks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(parse_json_response(response).await, json!({"stocks": []}));
}

#[tokio::test]
async fn test_offer_stocks_reports_each_offer() {
    let (app, store) = setup_test_router();

    let response = app
        .oneshot(offer_request(json!([
            {"ticker": "TSM", "description": "Taiwan Semiconductor", "initial_price": 42},
            {"ticker": "AAPL", "initial_price": 10},
            {"ticker": "NVO", "initial_price": 0},
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        parse_json_response(response).await,
        json!({
            "listed": ["TSM"],
            "rejected": [
                {"ticker": "AAPL", "reason": "The stock with such ticker is already listed"},
                {"ticker": "NVO", "reason": "Cannot list the stock with zero price"},
            ]
        })
    );

    assert_eq!(store.price("TSM").unwrap(), 42);
    assert_eq!(store.price("AAPL").unwrap(), 9_000);
    assert!(store.get("NVO").is_err());
}

#[tokio::test]
async fn test_offer_empty_batch() {
    let (app, store) = setup_test_router();

    let response = app.oneshot(offer_request(json!([]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        parse_json_response(response).await,
        json!({"listed": [], "rejected": []})
    );
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_offer_malformed_body_is_rejected() {
    let (app, store) = setup_test_router();

    let response = app
        .oneshot(offer_request(json!({"ticker": "TSM"})))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_subscribe_unknown_ticker_is_not_found() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(
            Request::get("/stocks/MSFT/price?interval_seconds=3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_json_response(response).await;
    assert_eq!(body["error"]["code"], 404);
    assert_eq!(body["error"]["message"], "the stock MSFT has not been found");
}

#[tokio::test]
async fn test_subscribe_zero_interval_is_bad_request() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(
            Request::get("/stocks/AAPL/price?interval_seconds=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_json_response(response).await;
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_subscribe_oversized_interval_is_bad_request() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(
            Request::get("/stocks/AAPL/price?interval_seconds=18446744073709551615")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_json_response(response).await;
    assert_eq!(body["error"]["code"], 400);
    assert_eq!(
        body["error"]["message"],
        "the interval must be between 1 and 86400 seconds"
    );
}

#[tokio::test]
async fn test_subscribe_without_upgrade_is_bad_request() {
    let (app, _) = setup_test_router();

    let response = app
        .oneshot(Request::get("/stocks/AAPL/price").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
