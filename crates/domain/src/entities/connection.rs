//! 连接相关实体
//!
//! 一条物理 WebSocket 连接在注册表中的元数据。

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::identity::UserRole;

/// 连接信息
///
/// 连接本体（socket）由连接任务独占持有，注册表只保存元数据。
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// 连接ID（每条物理连接唯一）
    pub connection_id: Uuid,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 用户角色
    pub role: UserRole,
    /// 认证邮箱
    pub email: String,
    /// 连接建立时间
    pub connected_at: DateTime<Utc>,
    /// 最后活跃时间
    pub last_active: DateTime<Utc>,
}

impl ConnectionInfo {
    /// 创建新的连接信息
    pub fn new(user_id: Uuid, role: UserRole, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            connection_id: Uuid::new_v4(),
            user_id,
            role,
            email: email.into(),
            connected_at: now,
            last_active: now,
        }
    }

    /// 更新最后活跃时间
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// 连接统计信息
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ConnectionStats {
    /// 历史连接总数
    pub total_connections: usize,
    /// 当前活跃连接数
    pub active_connections: usize,
    /// 峰值连接数
    pub peak_connections: usize,
    /// 当前在线用户数
    pub online_users: usize,
}
