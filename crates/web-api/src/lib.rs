//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 升级与每连接的生命周期管理，
//! 以及暴露给管理后台的 REST 推送接口。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
