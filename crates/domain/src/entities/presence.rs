//! 在线状态实体
//!
//! 一个用户的逻辑在线状态：同一用户可能同时有多个设备/标签页在线，
//! 只有连接集合清空（并度过宽限期）时才算离线。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::entities::identity::UserRole;

/// 用户在线状态条目
///
/// 不变式：`online == !connection_ids.is_empty()`，
/// 唯一的例外是离线宽限期内（集合已空但尚未广播离线）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// 用户ID
    pub user_id: Uuid,
    /// 角色
    pub role: UserRole,
    /// 邮箱
    pub email: String,
    /// 当前活跃的连接ID集合
    pub connection_ids: HashSet<Uuid>,
    /// 是否在线
    pub online: bool,
    /// 最后一次在线时间（在转为离线时落章，离线条目不会被删除）
    pub last_seen: DateTime<Utc>,
    /// 最近活跃的房间（用于"谁在哪里输入"的快速查询）
    pub current_room: Option<String>,
}

impl PresenceEntry {
    /// 为首次连接的用户创建条目
    pub fn new(user_id: Uuid, role: UserRole, email: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            email: email.into(),
            connection_ids: HashSet::new(),
            online: false,
            last_seen: Utc::now(),
            current_room: None,
        }
    }

    /// 当前连接数
    pub fn connection_count(&self) -> usize {
        self.connection_ids.len()
    }
}

/// 在线状态变更事件
///
/// 只在真正的 离线→在线 / 在线→离线 转换时发出，
/// 同一用户的多余连接开合不会产生事件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceChange {
    /// 用户ID
    pub user_id: Uuid,
    /// 是否在线
    pub online: bool,
    /// 变更时间
    pub at: DateTime<Utc>,
}

/// 注册连接的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 用户由离线转为在线（已广播）
    CameOnline,
    /// 用户已有其他连接在线，无状态转换
    AlreadyOnline,
}

/// 注销连接的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregisterOutcome {
    /// 用户还有其他连接在线，无状态转换
    StillOnline,
    /// 最后一个连接断开，离线广播已安排在宽限期后
    OfflinePending,
    /// 最后一个连接断开，已立即转为离线（宽限期为零）
    Offline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_starts_offline() {
        let entry = PresenceEntry::new(Uuid::new_v4(), UserRole::Member, "m@biznet.example");
        assert!(!entry.online);
        assert_eq!(entry.connection_count(), 0);
        assert!(entry.current_room.is_none());
    }
}
