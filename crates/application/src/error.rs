//! 应用层错误定义
//!
//! 按故障语义分类：认证失败拒绝连接；校验失败回错误事件、
//! 连接保持；持久化失败带可重试提示；内部错误只回笼统消息，
//! 细节进日志。单个事件处理的失败永远不会终止连接。

use domain::entities::ServerEvent;
use domain::errors::{RealtimeError, StorageError};
use thiserror::Error;
use uuid::Uuid;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 认证失败（连接被拒绝，不回传细节）
    #[error("authentication failed")]
    Authentication,

    /// 权限不足
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// 事件载荷校验失败
    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// 接收者无法解析为有效账户
    #[error("unknown recipient: {0}")]
    RecipientUnknown(Uuid),

    /// 存储协作方失败
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    /// 达到容量上限
    #[error("capacity exhausted")]
    Capacity,

    /// 未预期的内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;

impl ApplicationError {
    /// 创建校验错误
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 错误码（协议层的 error 事件使用）
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::Authentication => "AUTHENTICATION_FAILED",
            ApplicationError::Forbidden(_) => "FORBIDDEN",
            ApplicationError::Validation { .. } => "INVALID_EVENT",
            ApplicationError::RecipientUnknown(_) => "UNKNOWN_RECIPIENT",
            ApplicationError::Persistence(_) => "PERSISTENCE_FAILED",
            ApplicationError::Capacity => "CAPACITY_EXHAUSTED",
            ApplicationError::Internal(_) => "INTERNAL",
        }
    }

    /// 失败是否值得客户端重试
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ApplicationError::Persistence(_) | ApplicationError::Capacity
        )
    }

    /// 回传给客户端的消息（内部错误不泄露细节）
    pub fn client_message(&self) -> String {
        match self {
            ApplicationError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// 转换为协议层的 error 事件
    pub fn to_error_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code().to_string(),
            message: self.client_message(),
            retryable: self.retryable(),
        }
    }
}

impl From<RealtimeError> for ApplicationError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::CapacityExhausted => ApplicationError::Capacity,
            other => ApplicationError::Internal(other.to_string()),
        }
    }
}
