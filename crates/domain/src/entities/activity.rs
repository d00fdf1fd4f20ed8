//! 动态事件实体
//!
//! 轻量的追加式事件，广播给用户自己的其他设备与管理员。
//! 与通知不同，动态的持久化是尽力而为。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 动态事件实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEnvelope {
    /// 动态ID
    pub id: Uuid,
    /// 用户ID
    pub user_id: Uuid,
    /// 动态类型
    pub activity_type: String,
    /// 结构化载荷
    pub payload: JsonValue,
    /// 是否已读
    pub read: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl ActivityEnvelope {
    /// 创建新动态（ID与时间戳本地分配，持久化失败时仍可广播）
    pub fn new(user_id: Uuid, activity_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            activity_type: activity_type.into(),
            payload,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// 待持久化的动态草稿
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub activity_type: String,
    pub payload: JsonValue,
}

/// 动态类型常量
pub mod activity_types {
    pub const PROFILE_UPDATED: &str = "profile_updated";
    pub const COMPANY_FOLLOWED: &str = "company_followed";
    pub const FUNDING_APPLIED: &str = "funding_applied";
    pub const EVENT_JOINED: &str = "event_joined";
    pub const CONNECTION_ACCEPTED: &str = "connection_accepted";
}
