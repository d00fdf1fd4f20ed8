//! 身份与角色实体
//!
//! 连接握手时由凭证校验器解析出的用户身份。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户角色
///
/// 平台识别的固定角色集合，部署时通过配置进一步限制允许连接的子集。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// 普通会员
    Member,
    /// 管理员
    Admin,
    /// 超级管理员
    SuperAdmin,
}

impl UserRole {
    /// 角色的配置名
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    /// 从配置名解析角色，未识别的角色返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(UserRole::Member),
            "admin" => Some(UserRole::Admin),
            "super_admin" => Some(UserRole::SuperAdmin),
            _ => None,
        }
    }

    /// 是否具有管理员权限
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 已认证的用户身份
///
/// 只能由凭证校验器产出，之后随连接生命周期只读传递。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// 用户ID
    pub user_id: Uuid,
    /// 角色
    pub role: UserRole,
    /// 认证邮箱
    pub email: String,
}

/// 账户目录记录
///
/// 身份协作方（平台用户系统）返回的账户快照。
#[derive(Debug, Clone)]
pub struct AccountRecord {
    /// 用户ID
    pub user_id: Uuid,
    /// 邮箱
    pub email: String,
    /// 角色
    pub role: UserRole,
    /// 账户是否有效（停用账户不允许建立连接）
    pub active: bool,
}
