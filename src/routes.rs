use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the API router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/market-data", post(market_data))
        .route("/api/watchlist", get(get_watchlist).put(put_watchlist))
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// One dashboard poll. A missing or non-array `symbols` field is not an
/// error: the dashboard gets an empty object and carries on.
async fn market_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let Some(raw) = body.get("symbols").and_then(Value::as_array) else {
        return Ok(Json(json!({})));
    };

    let symbols: Vec<String> = raw
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    // The cycle runs in its own task so a dashboard client dropping the
    // connection mid-fetch cannot cancel it; the fetched data still lands
    // in the shared caches for the next poll.
    let worker = Arc::clone(&state);
    let response =
        tokio::spawn(async move { worker.market.market_data(&symbols).await }).await?;
    Ok(Json(serde_json::to_value(response)?))
}

async fn get_watchlist(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let symbols = state.watchlist.load()?;
    Ok(Json(json!({ "symbols": symbols })))
}

async fn put_watchlist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let symbols: Vec<String> = body
        .get("symbols")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let saved = state.watchlist.replace(symbols)?;
    Ok(Json(json!({ "symbols": saved })))
}
