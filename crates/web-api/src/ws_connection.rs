use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use application::{ApplicationError, ApplicationResult, SendMessageRequest};
use domain::entities::{AuthenticatedUser, ClientEvent, ConnectionInfo, OnlineUser, ServerEvent};
use domain::services::{personal_room, MessageRouter, PresenceManager, RoomManager, ADMIN_ROOM};

use crate::state::AppState;

/// WebSocket 连接管理器
///
/// 封装单个连接从注册到清理的完整生命周期：
/// - 注册在线状态与投递端，按角色自动入房
/// - 连接补发未读通知
/// - 事件循环：单个事件的失败回 error 事件，连接保持；
///   只有传输层错误才结束循环
/// - 清理顺序固定：输入状态 → 房间 → 投递端 → 在线状态
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user: AuthenticatedUser,
}

/// WebSocket 写操作命令
///
/// 协议层的控制帧走这个通道，与业务事件通道在发送任务里合流。
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user: AuthenticatedUser) -> Self {
        Self {
            socket,
            state,
            user,
        }
    }

    /// 运行连接的完整生命周期
    pub async fn run(self) {
        let Self {
            socket,
            state,
            user,
        } = self;

        let connection = ConnectionInfo::new(user.user_id, user.role, user.email.clone());
        let connection_id = connection.connection_id;

        // 注册在线状态；容量满时直接放弃，socket 随 drop 关闭
        if let Err(err) = state.presence.register_connection(connection).await {
            warn!("Connection refused for user {}: {}", user.user_id, err);
            return;
        }

        info!(
            user_id = %user.user_id,
            connection_id = %connection_id,
            "WebSocket 连接已建立"
        );

        // 投递端注册：之后所有面向这条连接的事件都从 event_rx 流出
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        state.router.register_sender(connection_id, event_tx.clone()).await;

        // 自动加入个人通知频道；管理员再进管理员房间
        state.rooms.join(connection_id, &personal_room(user.user_id)).await;
        if user.role.is_admin() {
            state.rooms.join(connection_id, ADMIN_ROOM).await;
        }

        // 这条连接自己的未读补发（每条连接各补发一次）
        if let Err(err) = state
            .notifications
            .sync_on_connect(user.user_id, connection_id)
            .await
        {
            error!("Notification catch-up failed for {}: {}", user.user_id, err);
        }

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendPong(data) => {
                            if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                break;
                            }
                        }
                    },
                    event = event_rx.recv() => match event {
                        Some(event) => {
                            let payload = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(err) => {
                                    warn!(error = %err, "failed to serialize websocket payload");
                                    continue;
                                }
                            };
                            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("WebSocket发送任务结束: {}", connection_id);
        });

        // 接收任务：解析客户端事件并分发
        let recv_state = state.clone();
        let recv_user = user.clone();
        let recv_task = tokio::spawn(async move {
            while let Some(result) = incoming.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => {
                        Self::handle_text(
                            &recv_state,
                            &recv_user,
                            connection_id,
                            text.as_str(),
                            &event_tx,
                        )
                        .await;
                    }
                    Ok(WsMessage::Ping(data)) => {
                        let _ = recv_state.presence.touch(connection_id).await;
                        if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Pong(_)) => {
                        let _ = recv_state.presence.touch(connection_id).await;
                    }
                    Ok(WsMessage::Binary(_)) => {
                        debug!("Binary frames are not part of the protocol");
                    }
                    Ok(WsMessage::Close(_)) => {
                        info!("WebSocket收到关闭消息: {}", connection_id);
                        break;
                    }
                    // 传输层错误才结束连接
                    Err(err) => {
                        warn!("WebSocket transport error on {}: {}", connection_id, err);
                        break;
                    }
                }
            }
            debug!("WebSocket接收任务结束: {}", connection_id);
        });

        // 等待任意一个任务完成（连接断开）
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        // 清理。顺序有讲究：先为未完结的输入状态合成停止信号，
        // 它们要赶在（宽限期后的）离线广播之前到达对端。
        state
            .dispatcher
            .connection_closed(connection_id, user.user_id)
            .await;
        state.rooms.leave_all(connection_id).await;
        state.router.unregister_sender(connection_id).await;
        match state.presence.deregister_connection(connection_id).await {
            Ok(outcome) => debug!(
                "Connection {} deregistered with outcome {:?}",
                connection_id, outcome
            ),
            Err(err) => warn!("Failed to deregister connection {}: {}", connection_id, err),
        }

        info!(
            user_id = %user.user_id,
            connection_id = %connection_id,
            "WebSocket连接已断开，状态已清理"
        );
    }

    /// 处理一帧文本：解析失败回校验错误，业务失败按分类回 error 事件。
    /// 任何一类失败都不会终止连接。
    async fn handle_text(
        state: &AppState,
        user: &AuthenticatedUser,
        connection_id: Uuid,
        text: &str,
        reply: &mpsc::UnboundedSender<ServerEvent>,
    ) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(err) => {
                debug!("Malformed client event on {}: {}", connection_id, err);
                let error = ApplicationError::validation("event", "malformed event payload");
                let _ = reply.send(error.to_error_event());
                return;
            }
        };

        if let Err(err) = Self::handle_event(state, user, connection_id, event, reply).await {
            match &err {
                ApplicationError::Internal(detail) => {
                    error!("Handler failure on {}: {}", connection_id, detail)
                }
                other => debug!("Event rejected on {}: {}", connection_id, other),
            }
            let _ = reply.send(err.to_error_event());
        }
    }

    async fn handle_event(
        state: &AppState,
        user: &AuthenticatedUser,
        connection_id: Uuid,
        event: ClientEvent,
        reply: &mpsc::UnboundedSender<ServerEvent>,
    ) -> ApplicationResult<()> {
        match event {
            ClientEvent::SendMessage {
                recipient_id,
                content,
                message_type,
                attachments,
                reply_to,
            } => {
                state
                    .dispatcher
                    .send_message(
                        user,
                        connection_id,
                        SendMessageRequest {
                            recipient_id,
                            content,
                            message_type,
                            attachments,
                            reply_to,
                        },
                    )
                    .await?;
            }
            ClientEvent::TypingStart { recipient_id } => {
                state
                    .dispatcher
                    .set_typing(user, connection_id, recipient_id, true)
                    .await?;
            }
            ClientEvent::TypingStop { recipient_id } => {
                state
                    .dispatcher
                    .set_typing(user, connection_id, recipient_id, false)
                    .await?;
            }
            ClientEvent::MarkRead { message_id } => {
                state.dispatcher.mark_read(user, message_id).await?;
            }
            ClientEvent::RequestOnlineUsers => {
                if !user.role.is_admin() {
                    return Err(ApplicationError::Forbidden(
                        "online user listing is admin-only".to_string(),
                    ));
                }
                let users: Vec<OnlineUser> = state
                    .presence
                    .online_users()
                    .await
                    .iter()
                    .map(OnlineUser::from)
                    .collect();
                let _ = reply.send(ServerEvent::OnlineUsersList { users });
            }
            ClientEvent::Ping => {
                let _ = state.presence.touch(connection_id).await;
                let _ = reply.send(ServerEvent::Pong);
            }
        }
        Ok(())
    }
}
