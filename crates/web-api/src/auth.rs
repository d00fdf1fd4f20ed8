//! REST 接口的认证辅助
//!
//! 管理接口从 Authorization 头提取 Bearer 凭证，
//! 复用与 WebSocket 握手相同的校验器。

use axum::http::HeaderMap;
use domain::entities::AuthenticatedUser;
use domain::services::TokenVerifier;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// 从 headers 中提取并校验凭证
pub async fn bearer_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

    state.verifier.verify(token).await.map_err(|err| {
        warn!("REST credential rejected: {}", err);
        ApiError::unauthorized("Invalid credential")
    })
}

/// 要求管理员角色
pub fn require_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("administrator role required"))
    }
}
