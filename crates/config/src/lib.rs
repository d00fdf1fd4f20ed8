//! 统一配置中心
//!
//! 提供实时服务的全局配置管理，包括：
//! - 服务监听地址
//! - JWT认证
//! - 在线状态与消息分发的调优参数

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
    /// 实时通信配置
    pub realtime: RealtimeConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// JWT配置
///
/// 本服务只负责校验token，签发由平台的认证服务完成；
/// `expiration_hours` 仅用于本地联调时签发测试token。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// 实时通信配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 离线判定宽限期（毫秒）：最后一个连接断开后，等待这么久再广播离线，
    /// 用于吸收页面刷新导致的"断开-重连"抖动
    pub presence_offline_grace_ms: u64,
    /// 输入状态自动过期时间（秒）：客户端崩溃时对端不会永远看到"正在输入"
    pub typing_idle_secs: u64,
    /// 握手认证超时（秒）：超时未完成认证的连接直接关闭
    pub handshake_timeout_secs: u64,
    /// 最大并发连接数
    pub max_connections: usize,
    /// 单条消息内容上限（字节）
    pub max_message_bytes: usize,
    /// 在线状态变更广播通道容量
    pub presence_channel_capacity: usize,
    /// 允许连接的角色列表（逗号分隔的部署配置）
    pub allowed_roles: Vec<String>,
}

impl AppConfig {
    /// 从环境变量加载配置
    /// 对于关键安全配置（JWT_SECRET），如果环境变量不存在将会 panic
    /// 这确保了生产环境中不会使用不安全的默认值
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .expect("JWT_SECRET environment variable is required for production safety"),
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24),
            },
            realtime: RealtimeConfig::from_env(),
        }
    }

    /// 从环境变量加载配置，开发环境版本
    /// 提供不安全的默认值，仅用于测试和开发
    pub fn from_env_with_defaults() -> Self {
        Self {
            server: ServerConfig::from_env(),
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                    "dev-secret-key-not-for-production-use-minimum-32-chars".to_string()
                }),
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24),
            },
            realtime: RealtimeConfig::from_env(),
        }
    }

    /// 验证配置有效性
    /// 增强的验证逻辑，特别关注生产环境安全
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证JWT密钥长度和安全性（至少256位/32字节）
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 检查JWT密钥是否为明显的开发密钥
        if self.jwt.secret.contains("dev-secret")
            || self.jwt.secret.contains("not-for-production")
            || self.jwt.secret.contains("please-change")
        {
            return Err(ConfigError::InvalidJwtSecret(
                "Cannot use development JWT secret in production".to_string(),
            ));
        }

        if self.realtime.max_connections == 0 {
            return Err(ConfigError::InvalidRealtimeConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.realtime.max_message_bytes == 0 {
            return Err(ConfigError::InvalidRealtimeConfig(
                "max_message_bytes must be greater than 0".to_string(),
            ));
        }

        // 宽限期过长会让离线状态长时间失真
        if self.realtime.presence_offline_grace_ms > 60_000 {
            return Err(ConfigError::InvalidRealtimeConfig(
                "presence_offline_grace_ms should not exceed 60000".to_string(),
            ));
        }

        if self.realtime.allowed_roles.is_empty() {
            return Err(ConfigError::InvalidRealtimeConfig(
                "allowed_roles must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
        }
    }
}

impl RealtimeConfig {
    fn from_env() -> Self {
        Self {
            presence_offline_grace_ms: env::var("PRESENCE_OFFLINE_GRACE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            typing_idle_secs: env::var("TYPING_IDLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            handshake_timeout_secs: env::var("HANDSHAKE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_connections: env::var("MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            max_message_bytes: env::var("MAX_MESSAGE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8192),
            presence_channel_capacity: env::var("PRESENCE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(256),
            allowed_roles: env::var("ALLOWED_ROLES")
                .map(|s| {
                    s.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec![
                        "member".to_string(),
                        "admin".to_string(),
                        "super_admin".to_string(),
                    ]
                }),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid realtime configuration: {0}")]
    InvalidRealtimeConfig(String),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),
}

impl Default for AppConfig {
    /// 默认配置使用开发环境版本
    /// 注意：生产环境应该明确调用 from_env() 而不是依赖默认值
    fn default() -> Self {
        Self::from_env_with_defaults()
    }
}
