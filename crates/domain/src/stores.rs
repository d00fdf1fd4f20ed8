//! 存储协作方接口定义
//!
//! 消息、通知、动态的持久化由平台的存储层完成，
//! 实时核心只通过这些接口消费，从不把内存状态当作历史记录的权威。

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    ActivityEnvelope, MessageEnvelope, NewActivity, NewMessage, NewNotification,
    NotificationEnvelope,
};
use crate::errors::StorageResult;

/// 消息已读标记的结果
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// 本次调用完成了 未读→已读 的转换
    Marked(MessageEnvelope),
    /// 消息此前已读，本次调用为空操作
    AlreadyRead(MessageEnvelope),
}

/// 消息存储接口
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 持久化消息，分配ID与创建时间
    async fn save_message(&self, draft: NewMessage) -> StorageResult<MessageEnvelope>;

    /// 根据ID查找消息
    async fn find_message(&self, message_id: Uuid) -> StorageResult<Option<MessageEnvelope>>;

    /// 标记消息已读（原子操作，重复调用返回 AlreadyRead）
    async fn mark_read(&self, message_id: Uuid) -> StorageResult<ReadOutcome>;
}

/// 通知存储接口
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// 持久化通知，分配ID与创建时间
    async fn save_notification(&self, draft: NewNotification)
        -> StorageResult<NotificationEnvelope>;

    /// 标记通知已读，返回是否发生了状态变化
    async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid)
        -> StorageResult<bool>;

    /// 列出用户的全部未读通知（按创建时间排序，最新在后）
    async fn list_unread_notifications(
        &self,
        user_id: Uuid,
    ) -> StorageResult<Vec<NotificationEnvelope>>;

    /// 未读通知数量
    async fn count_unread(&self, user_id: Uuid) -> StorageResult<u64>;
}

/// 动态存储接口
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// 持久化动态事件
    async fn save_activity(&self, draft: NewActivity) -> StorageResult<ActivityEnvelope>;
}
