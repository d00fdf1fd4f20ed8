//! 通知服务
//!
//! 投递与持久化解耦：`notify` 先持久化再尽力实时推送，
//! 所以连接补发永远不会漏掉通知；`sync_on_connect` 在每条
//! 连接建立时补发一次该用户的全部未读通知。

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use domain::entities::{NewNotification, ServerEvent};
use domain::errors::StorageError;
use domain::services::{MessageRouter, PresenceManager};
use domain::stores::NotificationStore;

use crate::error::{ApplicationError, ApplicationResult};

/// 通知服务
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    presence: Arc<dyn PresenceManager>,
    router: Arc<dyn MessageRouter>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        presence: Arc<dyn PresenceManager>,
        router: Arc<dyn MessageRouter>,
    ) -> Self {
        Self {
            store,
            presence,
            router,
        }
    }

    /// 通知用户
    ///
    /// 持久化成功后才算成功；实时推送是尽力而为的附加动作。
    /// 返回是否至少向一条活跃连接完成了实时投递。
    pub async fn notify(&self, user_id: Uuid, draft: NewNotification) -> ApplicationResult<bool> {
        let envelope = self.store.save_notification(draft).await?;

        if !self.presence.is_online(user_id).await {
            debug!(
                "Notification {} queued for offline user {}",
                envelope.id, user_id
            );
            return Ok(false);
        }

        let connections = self.presence.user_connections(user_id).await;
        let delivered = self
            .router
            .send_to_connections(
                &connections,
                ServerEvent::NewNotification {
                    notification: envelope,
                },
            )
            .await;

        Ok(delivered > 0)
    }

    /// 连接建立时的补发
    ///
    /// 只推送到这条新连接（每条连接各自补发一次），未读通知
    /// 按时间排序、最新在后，打包成一个批次事件。
    pub async fn sync_on_connect(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> ApplicationResult<()> {
        let notifications = self.store.list_unread_notifications(user_id).await?;
        let count = notifications.len();

        if let Err(err) = self
            .router
            .send_to_connection(
                connection_id,
                ServerEvent::UnreadNotificationsBatch { notifications },
            )
            .await
        {
            warn!(
                "Failed to push catch-up batch to connection {}: {}",
                connection_id, err
            );
        } else {
            debug!(
                "Pushed {} unread notification(s) to connection {}",
                count, connection_id
            );
        }

        Ok(())
    }

    /// 标记通知已读，返回是否发生了状态变化
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> ApplicationResult<bool> {
        match self
            .store
            .mark_notification_read(user_id, notification_id)
            .await
        {
            Ok(changed) => Ok(changed),
            Err(StorageError::NotFound) => Err(ApplicationError::validation(
                "notification_id",
                "unknown notification",
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// 未读通知数量
    pub async fn unread_count(&self, user_id: Uuid) -> ApplicationResult<u64> {
        Ok(self.store.count_unread(user_id).await?)
    }
}
