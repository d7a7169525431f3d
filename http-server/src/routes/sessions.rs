use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{AppState, error::ApiError, middleware::SessionUser};

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    /// Port on the client's host that receives fill notifications
    pub udp_port: Option<u16>,
}

// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub session_token: String,
    pub session: u64,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }

    let session = state
        .exchange
        .sessions()
        .try_login(username)
        .ok_or_else(|| ApiError::Conflict("User already logged in".to_string()))?;
    if let Some(port) = payload.udp_port {
        state
            .notifier
            .register(username, SocketAddr::new(peer.ip(), port));
    }

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        session_token: username.to_string(),
        session,
    };
    Ok((StatusCode::OK, Json(response)))
}

// Logout endpoint (protected route)
pub async fn logout(
    State(state): State<AppState>,
    SessionUser(username): SessionUser,
) -> (StatusCode, Json<LogoutResponse>) {
    state.exchange.sessions().logout_user(&username);
    state.notifier.unregister(&username);

    let response = LogoutResponse {
        success: true,
        message: "Logout successful".to_string(),
    };
    (StatusCode::OK, Json(response))
}
