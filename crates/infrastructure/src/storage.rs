//! 存储协作方的内存实现
//!
//! 平台的持久层（消息、通知、动态）在这里用内存结构代替，
//! 接口与错误语义保持一致，生产部署由平台的数据库实现替换。

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use async_trait::async_trait;
use chrono::Utc;
use domain::entities::{
    ActivityEnvelope, MessageEnvelope, NewActivity, NewMessage, NewNotification,
    NotificationEnvelope,
};
use domain::errors::{StorageError, StorageResult};
use domain::stores::{ActivityStore, MessageStore, NotificationStore, ReadOutcome};

/// 内存消息存储
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<Uuid, MessageEnvelope>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_message(&self, draft: NewMessage) -> StorageResult<MessageEnvelope> {
        let envelope = MessageEnvelope {
            id: Uuid::new_v4(),
            sender_id: draft.sender_id,
            recipient_id: draft.recipient_id,
            content: draft.content,
            kind: draft.kind,
            attachments: draft.attachments,
            reply_to: draft.reply_to,
            read: false,
            created_at: Utc::now(),
        };

        let mut messages = self.messages.write().await;
        messages.insert(envelope.id, envelope.clone());
        Ok(envelope)
    }

    async fn find_message(&self, message_id: Uuid) -> StorageResult<Option<MessageEnvelope>> {
        let messages = self.messages.read().await;
        Ok(messages.get(&message_id).cloned())
    }

    async fn mark_read(&self, message_id: Uuid) -> StorageResult<ReadOutcome> {
        let mut messages = self.messages.write().await;
        let message = messages.get_mut(&message_id).ok_or(StorageError::NotFound)?;

        if message.read {
            return Ok(ReadOutcome::AlreadyRead(message.clone()));
        }
        message.read = true;
        Ok(ReadOutcome::Marked(message.clone()))
    }
}

/// 内存通知存储
///
/// 每个用户的通知按插入顺序保存，天然满足"按时间排序，最新在后"。
#[derive(Default)]
pub struct InMemoryNotificationStore {
    by_user: RwLock<HashMap<Uuid, Vec<NotificationEnvelope>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn save_notification(
        &self,
        draft: NewNotification,
    ) -> StorageResult<NotificationEnvelope> {
        let envelope = NotificationEnvelope {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            category: draft.category,
            title: draft.title,
            body: draft.body,
            payload: draft.payload,
            read: false,
            created_at: Utc::now(),
            read_at: None,
        };

        let mut by_user = self.by_user.write().await;
        by_user
            .entry(envelope.user_id)
            .or_default()
            .push(envelope.clone());
        Ok(envelope)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> StorageResult<bool> {
        let mut by_user = self.by_user.write().await;
        let notifications = by_user.get_mut(&user_id).ok_or(StorageError::NotFound)?;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(StorageError::NotFound)?;

        if notification.read {
            return Ok(false);
        }
        notification.mark_as_read();
        Ok(true)
    }

    async fn list_unread_notifications(
        &self,
        user_id: Uuid,
    ) -> StorageResult<Vec<NotificationEnvelope>> {
        let by_user = self.by_user.read().await;
        Ok(by_user
            .get(&user_id)
            .map(|notifications| {
                notifications
                    .iter()
                    .filter(|n| !n.read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_unread(&self, user_id: Uuid) -> StorageResult<u64> {
        let by_user = self.by_user.read().await;
        Ok(by_user
            .get(&user_id)
            .map(|notifications| notifications.iter().filter(|n| !n.read).count() as u64)
            .unwrap_or(0))
    }
}

/// 内存动态存储
#[derive(Default)]
pub struct InMemoryActivityStore {
    items: RwLock<Vec<ActivityEnvelope>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的动态数量（测试用）
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn save_activity(&self, draft: NewActivity) -> StorageResult<ActivityEnvelope> {
        let envelope = ActivityEnvelope::new(draft.user_id, draft.activity_type, draft.payload);
        let mut items = self.items.write().await;
        items.push(envelope.clone());
        Ok(envelope)
    }
}
