//! 事件协议定义
//!
//! 客户端与服务端之间的事件是封闭的带标签集合，
//! 在边界处由serde完成校验，分发器不处理未经检查的形状。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::activity::ActivityEnvelope;
use crate::entities::identity::UserRole;
use crate::entities::message::{AttachmentRef, MessageEnvelope, MessageKind};
use crate::entities::notification::NotificationEnvelope;

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

/// 客户端事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// 发送直达消息
    SendMessage {
        recipient_id: Uuid,
        content: String,
        #[serde(default = "default_message_kind")]
        message_type: MessageKind,
        #[serde(default)]
        attachments: Vec<AttachmentRef>,
        reply_to: Option<Uuid>,
    },
    /// 开始输入
    TypingStart { recipient_id: Uuid },
    /// 停止输入
    TypingStop { recipient_id: Uuid },
    /// 标记消息已读
    MarkRead { message_id: Uuid },
    /// 请求在线用户列表（仅管理员）
    RequestOnlineUsers,
    /// 应用层心跳
    Ping,
}

/// 服务端事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 新消息
    NewMessage { message: MessageEnvelope },
    /// 发送确认（回送到发送者的其他连接，避免回声）
    MessageSentAck {
        message_id: Uuid,
        recipient_id: Uuid,
        created_at: DateTime<Utc>,
    },
    /// 对端开始输入
    TypingStart { sender_id: Uuid },
    /// 对端停止输入
    TypingStop { sender_id: Uuid },
    /// 已读回执
    MessageRead {
        message_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    },
    /// 新通知
    NewNotification { notification: NotificationEnvelope },
    /// 连接补发的未读通知批次（按时间排序，最新在后）
    UnreadNotificationsBatch {
        notifications: Vec<NotificationEnvelope>,
    },
    /// 在线状态变更
    PresenceChanged {
        user_id: Uuid,
        online: bool,
        at: DateTime<Utc>,
    },
    /// 动态广播
    ActivityBroadcast { activity: ActivityEnvelope },
    /// 在线用户列表（仅管理员）
    OnlineUsersList { users: Vec<OnlineUser> },
    /// 心跳响应
    Pong,
    /// 错误
    Error {
        code: String,
        message: String,
        retryable: bool,
    },
}

/// 在线用户摘要（管理员视图）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub connections: usize,
    pub last_seen: DateTime<Utc>,
}

impl From<&crate::entities::PresenceEntry> for OnlineUser {
    fn from(entry: &crate::entities::PresenceEntry) -> Self {
        Self {
            user_id: entry.user_id,
            email: entry.email.clone(),
            role: entry.role,
            connections: entry.connection_count(),
            last_seen: entry.last_seen,
        }
    }
}
