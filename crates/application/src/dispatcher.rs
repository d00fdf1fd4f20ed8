//! 消息分发器
//!
//! 一个用户的出站事件在这里完成校验与路由：直达消息先持久化
//! 再扇出（接收者的每条连接各一份，发送者的其他连接收确认），
//! 输入状态是纯瞬时信号并带自动过期，已读回执幂等。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use domain::entities::{
    AttachmentRef, AuthenticatedUser, MessageEnvelope, MessageKind, NewMessage, NewNotification,
    ServerEvent,
};
use domain::services::{personal_room, AccountDirectory, MessageRouter, PresenceManager};
use domain::stores::{MessageStore, ReadOutcome};

use crate::error::{ApplicationError, ApplicationResult};
use crate::notifications::NotificationService;

/// 发送消息请求
#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub content: String,
    pub message_type: MessageKind,
    pub attachments: Vec<AttachmentRef>,
    pub reply_to: Option<Uuid>,
}

/// 一个 (发送者, 接收者) 会话的输入状态
///
/// 记录哪些连接正在发输入信号；过期任务由新的开始信号重置，
/// 由停止信号或连接断开取消。
struct TypingState {
    connections: HashSet<Uuid>,
    expiry: JoinHandle<()>,
}

type TypingKey = (Uuid, Uuid);

/// 消息分发器依赖
pub struct DispatcherDependencies {
    pub presence: Arc<dyn PresenceManager>,
    pub router: Arc<dyn MessageRouter>,
    pub directory: Arc<dyn AccountDirectory>,
    pub messages: Arc<dyn MessageStore>,
    pub notifications: Arc<NotificationService>,
    pub typing_idle: Duration,
    pub max_message_bytes: usize,
}

/// 消息分发器
pub struct MessageDispatcher {
    presence: Arc<dyn PresenceManager>,
    router: Arc<dyn MessageRouter>,
    directory: Arc<dyn AccountDirectory>,
    messages: Arc<dyn MessageStore>,
    notifications: Arc<NotificationService>,
    typing: Arc<Mutex<HashMap<TypingKey, TypingState>>>,
    typing_idle: Duration,
    max_message_bytes: usize,
}

impl MessageDispatcher {
    pub fn new(deps: DispatcherDependencies) -> Self {
        Self {
            presence: deps.presence,
            router: deps.router,
            directory: deps.directory,
            messages: deps.messages,
            notifications: deps.notifications,
            typing: Arc::new(Mutex::new(HashMap::new())),
            typing_idle: deps.typing_idle,
            max_message_bytes: deps.max_message_bytes,
        }
    }

    /// 发送直达消息
    ///
    /// 持久化成功即算发送成功，实时投递是尽力而为；
    /// 接收者离线时转入通知队列，下次连接补发。
    pub async fn send_message(
        &self,
        sender: &AuthenticatedUser,
        origin_connection: Uuid,
        request: SendMessageRequest,
    ) -> ApplicationResult<MessageEnvelope> {
        if request.content.trim().is_empty() {
            return Err(ApplicationError::validation("content", "must not be empty"));
        }
        if request.content.len() > self.max_message_bytes {
            return Err(ApplicationError::validation(
                "content",
                format!("exceeds maximum size of {} bytes", self.max_message_bytes),
            ));
        }

        let recipient = self
            .directory
            .find_account(request.recipient_id)
            .await?
            .filter(|record| record.active)
            .ok_or(ApplicationError::RecipientUnknown(request.recipient_id))?;

        // 没有持久化记录就没有扇出：存储失败在这里直接返回
        let envelope = self
            .messages
            .save_message(NewMessage {
                sender_id: sender.user_id,
                recipient_id: recipient.user_id,
                content: request.content,
                kind: request.message_type,
                attachments: request.attachments,
                reply_to: request.reply_to,
            })
            .await?;

        if self.presence.is_online(recipient.user_id).await {
            let connections = self.presence.user_connections(recipient.user_id).await;
            let delivered = self
                .router
                .send_to_connections(
                    &connections,
                    ServerEvent::NewMessage {
                        message: envelope.clone(),
                    },
                )
                .await;
            debug!(
                "Message {} delivered live to {}/{} connection(s) of {}",
                envelope.id,
                delivered,
                connections.len(),
                recipient.user_id
            );
        } else {
            // 离线补发通知也必须落盘，否则重连补发会漏掉这条消息
            self.notifications
                .notify(recipient.user_id, NewNotification::for_message(&envelope))
                .await?;
        }

        // 发送确认回送到发送者的其他连接，发起连接本身不收（避免回声）
        let siblings: Vec<Uuid> = self
            .presence
            .user_connections(sender.user_id)
            .await
            .into_iter()
            .filter(|id| *id != origin_connection)
            .collect();
        if !siblings.is_empty() {
            self.router
                .send_to_connections(
                    &siblings,
                    ServerEvent::MessageSentAck {
                        message_id: envelope.id,
                        recipient_id: envelope.recipient_id,
                        created_at: envelope.created_at,
                    },
                )
                .await;
        }

        Ok(envelope)
    }

    /// 输入状态信号（从不持久化）
    ///
    /// 开始信号重置该会话的过期定时器；停止信号在最后一个
    /// 发信号的连接停下时才转发，避免另一台设备还在输入却被清掉。
    pub async fn set_typing(
        &self,
        sender: &AuthenticatedUser,
        origin_connection: Uuid,
        recipient_id: Uuid,
        is_typing: bool,
    ) -> ApplicationResult<()> {
        let key = (sender.user_id, recipient_id);

        if is_typing {
            {
                let mut typing = self.typing.lock().await;
                let mut connections = typing
                    .remove(&key)
                    .map(|previous| {
                        previous.expiry.abort();
                        previous.connections
                    })
                    .unwrap_or_default();
                connections.insert(origin_connection);
                let expiry = self.spawn_typing_expiry(key);
                typing.insert(key, TypingState { connections, expiry });
            }

            // 记录"正在哪个会话输入"，供快速查询
            let _ = self
                .presence
                .set_current_room(origin_connection, Some(personal_room(recipient_id)))
                .await;

            if self.presence.is_online(recipient_id).await {
                let connections = self.presence.user_connections(recipient_id).await;
                self.router
                    .send_to_connections(
                        &connections,
                        ServerEvent::TypingStart {
                            sender_id: sender.user_id,
                        },
                    )
                    .await;
            }
        } else {
            let cleared = {
                let mut typing = self.typing.lock().await;
                match typing.remove(&key) {
                    Some(mut state) => {
                        state.connections.remove(&origin_connection);
                        if state.connections.is_empty() {
                            state.expiry.abort();
                            true
                        } else {
                            typing.insert(key, state);
                            false
                        }
                    }
                    // 没有进行中的输入状态，停止信号是空操作
                    None => false,
                }
            };

            let _ = self.presence.set_current_room(origin_connection, None).await;
            if cleared {
                self.send_typing_stop(sender.user_id, recipient_id).await;
            }
        }

        Ok(())
    }

    /// 连接关闭时的清理
    ///
    /// 为这条连接仍在发输入信号的每个会话合成停止信号，
    /// 保证对端不会在一方消失后永远看到"正在输入"。
    /// 必须在注销在线状态之前调用，停止信号先于离线广播到达。
    pub async fn connection_closed(&self, connection_id: Uuid, user_id: Uuid) {
        let stopped: Vec<Uuid> = {
            let mut typing = self.typing.lock().await;
            let keys: Vec<TypingKey> = typing
                .keys()
                .filter(|(sender_id, _)| *sender_id == user_id)
                .copied()
                .collect();

            let mut stopped = Vec::new();
            for key in keys {
                if let Some(mut state) = typing.remove(&key) {
                    state.connections.remove(&connection_id);
                    if state.connections.is_empty() {
                        state.expiry.abort();
                        stopped.push(key.1);
                    } else {
                        typing.insert(key, state);
                    }
                }
            }
            stopped
        };

        for recipient_id in stopped {
            self.send_typing_stop(user_id, recipient_id).await;
        }
    }

    /// 标记消息已读
    ///
    /// 只有真正的 未读→已读 转换会通知原发送者；
    /// 重复调用是空操作，不会产生第二份回执。
    pub async fn mark_read(
        &self,
        reader: &AuthenticatedUser,
        message_id: Uuid,
    ) -> ApplicationResult<()> {
        let message = self
            .messages
            .find_message(message_id)
            .await?
            .ok_or_else(|| ApplicationError::validation("message_id", "unknown message"))?;

        if message.recipient_id != reader.user_id {
            return Err(ApplicationError::validation(
                "message_id",
                "only the recipient can mark a message read",
            ));
        }

        match self.messages.mark_read(message_id).await? {
            ReadOutcome::Marked(message) => {
                if self.presence.is_online(message.sender_id).await {
                    let connections = self.presence.user_connections(message.sender_id).await;
                    self.router
                        .send_to_connections(
                            &connections,
                            ServerEvent::MessageRead {
                                message_id,
                                reader_id: reader.user_id,
                                read_at: Utc::now(),
                            },
                        )
                        .await;
                }
            }
            ReadOutcome::AlreadyRead(_) => {
                debug!("Message {} already read, no receipt sent", message_id);
            }
        }

        Ok(())
    }

    fn spawn_typing_expiry(&self, key: TypingKey) -> JoinHandle<()> {
        let typing = Arc::clone(&self.typing);
        let presence = Arc::clone(&self.presence);
        let router = Arc::clone(&self.router);
        let idle = self.typing_idle;

        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let expired = {
                let mut typing = typing.lock().await;
                typing.remove(&key).is_some()
            };
            if expired {
                warn!(
                    "Typing indicator from {} to {} expired after {:?}",
                    key.0, key.1, idle
                );
                if presence.is_online(key.1).await {
                    let connections = presence.user_connections(key.1).await;
                    router
                        .send_to_connections(&connections, ServerEvent::TypingStop { sender_id: key.0 })
                        .await;
                }
            }
        })
    }

    async fn send_typing_stop(&self, sender_id: Uuid, recipient_id: Uuid) {
        if self.presence.is_online(recipient_id).await {
            let connections = self.presence.user_connections(recipient_id).await;
            self.router
                .send_to_connections(&connections, ServerEvent::TypingStop { sender_id })
                .await;
        }
    }
}
