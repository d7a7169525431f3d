use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use cross_matcher::orderbook::DepthLevel;
use cross_matcher::types::{Order, OrderKind, OrderSide};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, middleware::SessionUser};

const MAX_DEPTH_LEVELS: usize = 1000;

// Add order request, shared by limit and stop orders. For stops `price` is
// the trigger price.
#[derive(Deserialize)]
pub struct AddOrderRequest {
    pub side: OrderSide,
    pub size: u64,
    pub price: u64,
}

#[derive(Deserialize)]
pub struct MarketOrderRequest {
    pub side: OrderSide,
    pub size: u64,
}

// Add order response
#[derive(Serialize)]
pub struct AddOrderResponse {
    pub success: bool,
    pub order_id: u64,
    pub session: Option<u64>,
}

// Market order response; `order_id` is -1 when the best level could not fill
#[derive(Serialize)]
pub struct MarketOrderResponse {
    pub success: bool,
    pub order_id: i64,
    pub session: Option<u64>,
}

#[derive(Serialize)]
pub struct CancelOrderResponse {
    pub success: bool,
    pub order_id: u64,
    pub session: Option<u64>,
}

// Order response model
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: u64,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub size: u64,
    pub price: u64,
    pub user_id: String,
    pub timestamp: u64,
    pub executed: bool,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            executed: order.is_executed(),
            id: order.id,
            side: order.side,
            kind: order.kind,
            size: order.size,
            price: order.price,
            user_id: order.user_id,
            timestamp: order.timestamp,
        }
    }
}

// Depth request query parameters
#[derive(Deserialize)]
pub struct DepthRequest {
    #[serde(default = "default_levels")]
    pub levels: usize,
}

fn default_levels() -> usize {
    100
}

#[derive(Serialize)]
pub struct DepthResponse {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

// Add limit order endpoint
pub async fn add_limit_order(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
    Json(payload): Json<AddOrderRequest>,
) -> Result<(StatusCode, Json<AddOrderResponse>), ApiError> {
    let ack = state
        .exchange
        .insert_limit_order(payload.side, payload.size, payload.price, &username)?;

    let response = AddOrderResponse {
        success: true,
        order_id: ack.value,
        session: ack.session,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// Add stop order endpoint
pub async fn add_stop_order(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
    Json(payload): Json<AddOrderRequest>,
) -> Result<(StatusCode, Json<AddOrderResponse>), ApiError> {
    let ack = state
        .exchange
        .insert_stop_order(payload.side, payload.size, payload.price, &username)?;

    let response = AddOrderResponse {
        success: true,
        order_id: ack.value,
        session: ack.session,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// Market order endpoint. A liquidity failure is a normal outcome, not an error.
pub async fn add_market_order(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
    Json(payload): Json<MarketOrderRequest>,
) -> Result<(StatusCode, Json<MarketOrderResponse>), ApiError> {
    let ack = state
        .exchange
        .insert_market_order(payload.side, payload.size, &username)?;

    let response = match ack.value {
        Some(order_id) => MarketOrderResponse {
            success: true,
            order_id: order_id as i64,
            session: ack.session,
        },
        None => MarketOrderResponse {
            success: false,
            order_id: -1,
            session: ack.session,
        },
    };
    Ok((StatusCode::OK, Json(response)))
}

// Cancel order endpoint
pub async fn cancel_order(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
    Path(order_id): Path<u64>,
) -> Result<Json<CancelOrderResponse>, ApiError> {
    let ack = state.exchange.cancel_order(order_id, &username)?;

    Ok(Json(CancelOrderResponse {
        success: true,
        order_id: ack.value,
        session: ack.session,
    }))
}

// Order lookup across resting orders and history
pub async fn get_order(
    State(state): State<AppState>,
    SessionUser(_username): SessionUser,
    Path(order_id): Path<u64>,
) -> Result<Json<OrderResponse>, ApiError> {
    state
        .exchange
        .get_order(order_id)
        .map(|order| Json(order.into()))
        .ok_or(ApiError::Order(cross_matcher::OrderError::NotFound(order_id)))
}

// Get orderbook depth endpoint
pub async fn get_depth(
    State(state): State<AppState>,
    SessionUser(_username): SessionUser,
    Query(params): Query<DepthRequest>,
) -> Result<Json<DepthResponse>, ApiError> {
    if params.levels == 0 || params.levels > MAX_DEPTH_LEVELS {
        return Err(ApiError::BadRequest(format!(
            "levels must be between 1 and {}",
            MAX_DEPTH_LEVELS
        )));
    }

    let depth = state.exchange.depth(params.levels);
    Ok(Json(DepthResponse {
        bids: depth.bids,
        asks: depth.asks,
    }))
}
