//! 领域模型错误定义
//!
//! 按失败来源分层：存储协作方、凭证校验、实时组件自身。

use thiserror::Error;
use uuid::Uuid;

/// 存储协作方错误
///
/// 平台数据库是历史记录的唯一权威，这里只转述它的失败。
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    /// 资源不存在
    #[error("resource not found")]
    NotFound,

    /// 资源冲突
    #[error("resource conflict")]
    Conflict,

    /// 存储失败
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl StorageError {
    /// 创建存储失败错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 存储结果类型
pub type StorageResult<T> = Result<T, StorageError>;

/// 凭证校验错误
///
/// 校验失败的细节只进日志，不回传给对端——未认证的连接直接拒绝。
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// 凭证缺失
    #[error("missing credential")]
    MissingToken,

    /// 凭证格式错误或签名不匹配
    #[error("invalid credential: {0}")]
    InvalidToken(String),

    /// 凭证已过期
    #[error("credential expired")]
    Expired,

    /// 主体不再对应有效账户
    #[error("account not found or inactive")]
    UnknownAccount,

    /// 角色不在允许的集合内
    #[error("role not allowed: {0}")]
    RoleNotAllowed(String),
}

/// 实时组件错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RealtimeError {
    /// 连接不存在
    #[error("connection not found: {0}")]
    ConnectionNotFound(Uuid),

    /// 达到最大连接数
    #[error("maximum connections reached")]
    CapacityExhausted,

    /// 消息投递失败
    #[error("failed to send to connection: {0}")]
    SendFailed(String),
}
