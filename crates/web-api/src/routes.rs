use std::time::Duration;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use uuid::Uuid;

use domain::entities::{ActivityEnvelope, ConnectionStats, OnlineUser, ServerEvent};
use domain::services::TokenVerifier;

use crate::auth::{bearer_identity, require_admin};
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws_connection::WebSocketConnection;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(websocket_upgrade))
        .route("/admin/online", get(admin_online))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/broadcast", post(admin_broadcast))
        .route("/admin/activity", post(admin_activity))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket 升级
///
/// 凭证校验在升级之前完成并带超时：校验失败或超时的连接
/// 直接拒绝，不会留下任何半注册的状态。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.unwrap_or_default();
    let handshake_timeout = Duration::from_secs(state.realtime.handshake_timeout_secs);

    let user = match tokio::time::timeout(handshake_timeout, state.verifier.verify(&token)).await {
        Ok(Ok(user)) => user,
        Ok(Err(err)) => {
            warn!("WebSocket upgrade rejected: {}", err);
            return Err(ApiError::unauthorized("Invalid credential"));
        }
        Err(_) => {
            warn!("WebSocket credential verification timed out");
            return Err(ApiError::unauthorized("Credential verification timed out"));
        }
    };

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, user).run()))
}

async fn admin_online(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<OnlineUser>>, ApiError> {
    let user = bearer_identity(&state, &headers).await?;
    require_admin(&user)?;

    let users = state
        .gateway
        .online_users()
        .await
        .iter()
        .map(OnlineUser::from)
        .collect();
    Ok(Json(users))
}

async fn admin_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectionStats>, ApiError> {
    let user = bearer_identity(&state, &headers).await?;
    require_admin(&user)?;

    Ok(Json(state.gateway.stats().await))
}

/// 管理广播请求
///
/// 默认广播到所有连接；`user_id` / `room_id` / `admins_only`
/// 三者择一收窄目标。事件本身是封闭集合，serde 在边界完成校验。
#[derive(Debug, Deserialize)]
struct BroadcastPayload {
    #[serde(default)]
    user_id: Option<Uuid>,
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default)]
    admins_only: bool,
    event: ServerEvent,
}

#[derive(Debug, Serialize)]
struct BroadcastResponse {
    delivered: usize,
}

async fn admin_broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BroadcastPayload>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let user = bearer_identity(&state, &headers).await?;
    require_admin(&user)?;

    let delivered = if let Some(user_id) = payload.user_id {
        state.gateway.send_to_user(user_id, payload.event).await
    } else if let Some(room_id) = payload.room_id {
        state.gateway.send_to_room(&room_id, payload.event).await
    } else if payload.admins_only {
        state.gateway.broadcast_to_admins(payload.event).await
    } else {
        state.gateway.broadcast_to_all(payload.event).await
    };

    Ok(Json(BroadcastResponse { delivered }))
}

#[derive(Debug, Deserialize)]
struct ActivityPayload {
    user_id: Uuid,
    activity_type: String,
    #[serde(default)]
    payload: JsonValue,
}

async fn admin_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ActivityPayload>,
) -> Result<Json<ActivityEnvelope>, ApiError> {
    let user = bearer_identity(&state, &headers).await?;
    require_admin(&user)?;

    let envelope = state
        .activity
        .publish(
            payload.user_id,
            &payload.activity_type,
            payload.payload,
            None,
        )
        .await;
    Ok(Json(envelope))
}
