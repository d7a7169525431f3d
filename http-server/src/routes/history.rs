use axum::{
    Json,
    extract::{Path, State},
};
use cross_matcher::history::TradeHistory;
use std::collections::BTreeMap;

use crate::{AppState, error::ApiError, middleware::SessionUser};

// Daily OHLC for a month given as MMYYYY, keyed by day of month
pub async fn get_price_history(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
    Path(month): Path<String>,
) -> Result<Json<BTreeMap<String, TradeHistory>>, ApiError> {
    let days = state.exchange.get_price_history(&month, &username)?;

    Ok(Json(
        days.into_iter()
            .map(|(day, summary)| (day.to_string(), summary))
            .collect(),
    ))
}
