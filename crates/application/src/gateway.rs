//! 实时推送网关
//!
//! 暴露给平台其他模块（管理后台、融资流程等）的推送入口，
//! 调用方无需了解连接管理的内部结构。同时负责把注册表的
//! 在线状态变更转发给所有活跃连接。

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use domain::entities::{ConnectionStats, PresenceEntry, ServerEvent};
use domain::errors::RealtimeError;
use domain::services::{MessageRouter, PresenceManager, RoomManager, ADMIN_ROOM};

/// 实时推送网关
pub struct RealtimeGateway {
    presence: Arc<dyn PresenceManager>,
    rooms: Arc<dyn RoomManager>,
    router: Arc<dyn MessageRouter>,
}

impl RealtimeGateway {
    pub fn new(
        presence: Arc<dyn PresenceManager>,
        rooms: Arc<dyn RoomManager>,
        router: Arc<dyn MessageRouter>,
    ) -> Self {
        Self {
            presence,
            rooms,
            router,
        }
    }

    /// 推送事件到用户的所有连接，返回成功投递的数量
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let connections = self.presence.user_connections(user_id).await;
        self.router.send_to_connections(&connections, event).await
    }

    /// 推送事件到单个连接
    pub async fn send_to_connection(
        &self,
        connection_id: Uuid,
        event: ServerEvent,
    ) -> Result<(), RealtimeError> {
        self.router.send_to_connection(connection_id, event).await
    }

    /// 推送事件到房间的所有连接，返回成功投递的数量
    pub async fn send_to_room(&self, room_id: &str, event: ServerEvent) -> usize {
        let members = self.rooms.members_of(room_id).await;
        self.router.send_to_connections(&members, event).await
    }

    /// 广播事件到所有活跃连接
    pub async fn broadcast_to_all(&self, event: ServerEvent) -> usize {
        self.router.broadcast(event).await
    }

    /// 广播事件到管理员房间
    pub async fn broadcast_to_admins(&self, event: ServerEvent) -> usize {
        self.send_to_room(ADMIN_ROOM, event).await
    }

    /// 用户是否在线
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.presence.is_online(user_id).await
    }

    /// 在线用户数
    pub async fn online_count(&self) -> usize {
        self.presence.online_count().await
    }

    /// 所有在线用户
    pub async fn online_users(&self) -> Vec<PresenceEntry> {
        self.presence.online_users().await
    }

    /// 连接统计
    pub async fn stats(&self) -> ConnectionStats {
        self.presence.stats().await
    }

    /// 启动在线状态扇出任务
    ///
    /// 订阅注册表的状态变更并广播给所有连接。当前部署策略是
    /// 全量广播；若要限制为有关系的观察者，在这里过滤即可，
    /// 注册表接口不需要变。
    pub fn spawn_presence_fanout(&self) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        let mut events = self.presence.subscribe();

        tokio::spawn(async move {
            info!("Presence fan-out task started");
            loop {
                match events.recv().await {
                    Ok(change) => {
                        router
                            .broadcast(ServerEvent::PresenceChanged {
                                user_id: change.user_id,
                                online: change.online,
                                at: change.at,
                            })
                            .await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Presence fan-out lagged, {} event(s) skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Presence fan-out task stopped");
        })
    }
}
