use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::AppState;

pub mod history;
pub mod orders;
pub mod sessions;

use history::get_price_history;
use orders::{add_limit_order, add_market_order, add_stop_order, cancel_order, get_depth, get_order};
use sessions::{login, logout};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/orders/limit", post(add_limit_order))
        .route("/orders/market", post(add_market_order))
        .route("/orders/stop", post(add_stop_order))
        .route("/orders/{id}", get(get_order).delete(cancel_order))
        .route("/depth", get(get_depth))
        .route("/history/{month}", get(get_price_history))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "CROSS exchange API - POST /login to start a session, POST /orders/{limit,market,stop} to trade, DELETE /orders/{id} to cancel, GET /history/{MMYYYY} for daily prices"
}
