//! 应用层集成测试的公共装配
//!
//! 用真实的内存基础设施搭一套完整的分发链路，
//! 测试里以 (连接ID, 事件接收端) 模拟一台设备。

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use application::{DispatcherDependencies, MessageDispatcher, NotificationService};
use domain::entities::{AccountRecord, AuthenticatedUser, ConnectionInfo, ServerEvent, UserRole};
use domain::services::{MessageRouter, PresenceManager};
use infrastructure::{
    InMemoryAccountDirectory, InMemoryActivityStore, InMemoryMessageRouter,
    InMemoryMessageStore, InMemoryNotificationStore, InMemoryPresenceManager,
    InMemoryRoomManager,
};

pub struct Harness {
    pub presence: Arc<InMemoryPresenceManager>,
    pub rooms: Arc<InMemoryRoomManager>,
    pub router: Arc<InMemoryMessageRouter>,
    pub directory: Arc<InMemoryAccountDirectory>,
    pub messages: Arc<InMemoryMessageStore>,
    pub notification_store: Arc<InMemoryNotificationStore>,
    pub activity_store: Arc<InMemoryActivityStore>,
    pub notifications: Arc<NotificationService>,
    pub dispatcher: MessageDispatcher,
}

impl Harness {
    /// 默认装配：离线宽限期为零，输入状态过期放宽到测试不会触发
    pub fn new() -> Self {
        Self::with_typing_idle(Duration::from_secs(30))
    }

    pub fn with_typing_idle(typing_idle: Duration) -> Self {
        let presence = Arc::new(InMemoryPresenceManager::new(Duration::ZERO, 100));
        let rooms = Arc::new(InMemoryRoomManager::new());
        let router = Arc::new(InMemoryMessageRouter::new());
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let messages = Arc::new(InMemoryMessageStore::new());
        let notification_store = Arc::new(InMemoryNotificationStore::new());
        let activity_store = Arc::new(InMemoryActivityStore::new());

        let notifications = Arc::new(NotificationService::new(
            notification_store.clone(),
            presence.clone(),
            router.clone(),
        ));

        let dispatcher = MessageDispatcher::new(DispatcherDependencies {
            presence: presence.clone(),
            router: router.clone(),
            directory: directory.clone(),
            messages: messages.clone(),
            notifications: notifications.clone(),
            typing_idle,
            max_message_bytes: 8192,
        });

        Self {
            presence,
            rooms,
            router,
            directory,
            messages,
            notification_store,
            activity_store,
            notifications,
            dispatcher,
        }
    }

    /// 预置一个有效账户并返回其身份
    pub async fn seed_user(&self, role: UserRole, email: &str) -> AuthenticatedUser {
        let user_id = Uuid::new_v4();
        self.directory
            .insert(AccountRecord {
                user_id,
                email: email.to_string(),
                role,
                active: true,
            })
            .await;
        AuthenticatedUser {
            user_id,
            role,
            email: email.to_string(),
        }
    }

    /// 模拟一台设备上线：注册连接与发送端，返回连接ID和事件接收端
    pub async fn connect(&self, user: &AuthenticatedUser) -> (Uuid, UnboundedReceiver<ServerEvent>) {
        let connection = ConnectionInfo::new(user.user_id, user.role, user.email.clone());
        let connection_id = connection.connection_id;
        self.presence.register_connection(connection).await.unwrap();

        let (tx, rx) = unbounded_channel();
        self.router.register_sender(connection_id, tx).await;
        (connection_id, rx)
    }
}

/// 取出接收端里已有的全部事件
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// 按事件名过滤
pub fn of_type(events: &[ServerEvent], name: &str) -> usize {
    events
        .iter()
        .filter(|event| event_name(event) == name)
        .count()
}

pub fn event_name(event: &ServerEvent) -> &'static str {
    match event {
        ServerEvent::NewMessage { .. } => "new_message",
        ServerEvent::MessageSentAck { .. } => "message_sent_ack",
        ServerEvent::TypingStart { .. } => "typing_start",
        ServerEvent::TypingStop { .. } => "typing_stop",
        ServerEvent::MessageRead { .. } => "message_read",
        ServerEvent::NewNotification { .. } => "new_notification",
        ServerEvent::UnreadNotificationsBatch { .. } => "unread_notifications_batch",
        ServerEvent::PresenceChanged { .. } => "presence_changed",
        ServerEvent::ActivityBroadcast { .. } => "activity_broadcast",
        ServerEvent::OnlineUsersList { .. } => "online_users_list",
        ServerEvent::Pong => "pong",
        ServerEvent::Error { .. } => "error",
    }
}
