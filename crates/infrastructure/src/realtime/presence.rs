//! 内存在线状态注册表
//!
//! 以 连接ID→连接信息 和 用户ID→在线条目 双向索引，两个索引
//! 在同一把锁下变更。离线转换带可配置的宽限期：最后一个连接
//! 断开后延迟广播离线，期间重连则取消，吸收页面刷新的抖动。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use config::RealtimeConfig;
use domain::entities::{
    ConnectionInfo, ConnectionStats, DeregisterOutcome, PresenceChange, PresenceEntry,
    RegisterOutcome,
};
use domain::errors::RealtimeError;
use domain::services::PresenceManager;

/// 每个用户的注册表槽位
///
/// `epoch` 在每次注册/注销时递增；宽限期任务记住自己创建时的
/// epoch，醒来后发现对不上就放弃，保证过期定时器永远不会误发离线。
struct UserSlot {
    entry: PresenceEntry,
    epoch: u64,
    offline_task: Option<JoinHandle<()>>,
}

impl UserSlot {
    fn new(entry: PresenceEntry) -> Self {
        Self {
            entry,
            epoch: 0,
            offline_task: None,
        }
    }
}

/// 双向索引的注册表状态，整体在一把锁下
struct PresenceState {
    connections: HashMap<Uuid, ConnectionInfo>,
    users: HashMap<Uuid, UserSlot>,
    total_connections: usize,
    peak_connections: usize,
}

/// 内存在线状态注册表
pub struct InMemoryPresenceManager {
    state: Arc<RwLock<PresenceState>>,
    events: broadcast::Sender<PresenceChange>,
    offline_grace: Duration,
    max_connections: usize,
}

impl InMemoryPresenceManager {
    /// 创建注册表
    pub fn new(offline_grace: Duration, max_connections: usize) -> Self {
        Self::with_capacity(offline_grace, max_connections, 256)
    }

    /// 创建注册表并指定事件通道容量
    pub fn with_capacity(
        offline_grace: Duration,
        max_connections: usize,
        channel_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(channel_capacity);
        Self {
            state: Arc::new(RwLock::new(PresenceState {
                connections: HashMap::new(),
                users: HashMap::new(),
                total_connections: 0,
                peak_connections: 0,
            })),
            events,
            offline_grace,
            max_connections,
        }
    }

    /// 按配置创建注册表
    pub fn from_config(cfg: &RealtimeConfig) -> Self {
        Self::with_capacity(
            Duration::from_millis(cfg.presence_offline_grace_ms),
            cfg.max_connections,
            cfg.presence_channel_capacity,
        )
    }
}

#[async_trait]
impl PresenceManager for InMemoryPresenceManager {
    async fn register_connection(
        &self,
        connection: ConnectionInfo,
    ) -> Result<RegisterOutcome, RealtimeError> {
        let mut state = self.state.write().await;

        if state.connections.len() >= self.max_connections {
            return Err(RealtimeError::CapacityExhausted);
        }

        let connection_id = connection.connection_id;
        let user_id = connection.user_id;
        let role = connection.role;
        let email = connection.email.clone();

        state.connections.insert(connection_id, connection);
        state.total_connections += 1;
        let active = state.connections.len();
        state.peak_connections = state.peak_connections.max(active);

        let slot = state
            .users
            .entry(user_id)
            .or_insert_with(|| UserSlot::new(PresenceEntry::new(user_id, role, email.clone())));

        // 宽限期内重连：取消待执行的离线广播，不产生任何抖动
        if let Some(task) = slot.offline_task.take() {
            task.abort();
        }
        slot.epoch += 1;

        let was_online = slot.entry.online;
        slot.entry.connection_ids.insert(connection_id);
        slot.entry.online = true;
        slot.entry.role = role;
        slot.entry.email = email;

        info!(
            "Connection {} registered for user {} ({} active)",
            connection_id,
            user_id,
            slot.entry.connection_count()
        );

        if was_online {
            Ok(RegisterOutcome::AlreadyOnline)
        } else {
            let _ = self.events.send(PresenceChange {
                user_id,
                online: true,
                at: Utc::now(),
            });
            Ok(RegisterOutcome::CameOnline)
        }
    }

    async fn deregister_connection(
        &self,
        connection_id: Uuid,
    ) -> Result<DeregisterOutcome, RealtimeError> {
        let mut state = self.state.write().await;

        let connection = state
            .connections
            .remove(&connection_id)
            .ok_or(RealtimeError::ConnectionNotFound(connection_id))?;
        let user_id = connection.user_id;

        let slot = state
            .users
            .get_mut(&user_id)
            .ok_or(RealtimeError::ConnectionNotFound(connection_id))?;

        slot.entry.connection_ids.remove(&connection_id);
        slot.epoch += 1;

        if !slot.entry.connection_ids.is_empty() {
            info!(
                "Connection {} deregistered for user {} ({} remaining)",
                connection_id,
                user_id,
                slot.entry.connection_count()
            );
            return Ok(DeregisterOutcome::StillOnline);
        }

        if self.offline_grace.is_zero() {
            slot.entry.online = false;
            slot.entry.last_seen = Utc::now();
            let _ = self.events.send(PresenceChange {
                user_id,
                online: false,
                at: slot.entry.last_seen,
            });
            info!("User {} went offline", user_id);
            return Ok(DeregisterOutcome::Offline);
        }

        // 延迟广播离线；任务记住当前epoch，宽限期内的任何注册/注销都会让它失效
        let epoch = slot.epoch;
        let state_handle = Arc::clone(&self.state);
        let events = self.events.clone();
        let grace = self.offline_grace;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut state = state_handle.write().await;
            if let Some(slot) = state.users.get_mut(&user_id) {
                if slot.epoch == epoch && slot.entry.connection_ids.is_empty() && slot.entry.online
                {
                    slot.entry.online = false;
                    slot.entry.last_seen = Utc::now();
                    slot.offline_task = None;
                    let _ = events.send(PresenceChange {
                        user_id,
                        online: false,
                        at: slot.entry.last_seen,
                    });
                    info!("User {} went offline after grace period", user_id);
                }
            }
        });
        slot.offline_task = Some(handle);

        debug!(
            "Connection {} deregistered for user {}, offline broadcast pending",
            connection_id, user_id
        );
        Ok(DeregisterOutcome::OfflinePending)
    }

    async fn is_online(&self, user_id: Uuid) -> bool {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(|slot| slot.entry.online)
            .unwrap_or(false)
    }

    async fn online_users(&self) -> Vec<PresenceEntry> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .filter(|slot| slot.entry.online)
            .map(|slot| slot.entry.clone())
            .collect()
    }

    async fn online_count(&self) -> usize {
        let state = self.state.read().await;
        state.users.values().filter(|slot| slot.entry.online).count()
    }

    async fn user_connections(&self, user_id: Uuid) -> Vec<Uuid> {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(|slot| slot.entry.connection_ids.iter().copied().collect())
            .unwrap_or_default()
    }

    async fn get_connection(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let state = self.state.read().await;
        state.connections.get(&connection_id).cloned()
    }

    async fn touch(&self, connection_id: Uuid) -> Result<(), RealtimeError> {
        let mut state = self.state.write().await;
        let connection = state
            .connections
            .get_mut(&connection_id)
            .ok_or(RealtimeError::ConnectionNotFound(connection_id))?;
        connection.touch();
        Ok(())
    }

    async fn set_current_room(
        &self,
        connection_id: Uuid,
        room_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        let mut state = self.state.write().await;
        let user_id = state
            .connections
            .get(&connection_id)
            .map(|conn| conn.user_id)
            .ok_or(RealtimeError::ConnectionNotFound(connection_id))?;
        if let Some(slot) = state.users.get_mut(&user_id) {
            slot.entry.current_room = room_id;
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PresenceChange> {
        self.events.subscribe()
    }

    async fn stats(&self) -> ConnectionStats {
        let state = self.state.read().await;
        ConnectionStats {
            total_connections: state.total_connections,
            active_connections: state.connections.len(),
            peak_connections: state.peak_connections,
            online_users: state.users.values().filter(|slot| slot.entry.online).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::entities::UserRole;
    use std::time::Duration;

    fn manager(grace_ms: u64) -> InMemoryPresenceManager {
        InMemoryPresenceManager::new(Duration::from_millis(grace_ms), 100)
    }

    fn conn(user_id: Uuid) -> ConnectionInfo {
        ConnectionInfo::new(user_id, UserRole::Member, "user@biznet.example")
    }

    #[tokio::test]
    async fn test_multi_device_presence() {
        let manager = manager(0);
        let user_id = Uuid::new_v4();

        // 两个设备先后上线，只有第一个触发状态转换
        let first = conn(user_id);
        let second = conn(user_id);
        let first_id = first.connection_id;
        let second_id = second.connection_id;

        assert_eq!(
            manager.register_connection(first).await.unwrap(),
            RegisterOutcome::CameOnline
        );
        assert_eq!(
            manager.register_connection(second).await.unwrap(),
            RegisterOutcome::AlreadyOnline
        );
        assert!(manager.is_online(user_id).await);
        assert_eq!(manager.user_connections(user_id).await.len(), 2);
        assert_eq!(
            manager.get_connection(first_id).await.map(|c| c.user_id),
            Some(user_id)
        );

        // 关掉一个设备仍然在线
        assert_eq!(
            manager.deregister_connection(first_id).await.unwrap(),
            DeregisterOutcome::StillOnline
        );
        assert!(manager.is_online(user_id).await);

        // 最后一个设备断开立即离线（宽限期为零）
        assert_eq!(
            manager.deregister_connection(second_id).await.unwrap(),
            DeregisterOutcome::Offline
        );
        assert!(!manager.is_online(user_id).await);
        assert_eq!(manager.online_count().await, 0);
    }

    #[tokio::test]
    async fn test_presence_events_only_on_transitions() {
        let manager = manager(0);
        let user_id = Uuid::new_v4();
        let mut events = manager.subscribe();

        let first = conn(user_id);
        let second = conn(user_id);
        let first_id = first.connection_id;
        let second_id = second.connection_id;

        manager.register_connection(first).await.unwrap();
        manager.register_connection(second).await.unwrap();
        manager.deregister_connection(first_id).await.unwrap();
        manager.deregister_connection(second_id).await.unwrap();

        // 整个过程只应有一次上线和一次离线
        let online = events.try_recv().unwrap();
        assert!(online.online);
        let offline = events.try_recv().unwrap();
        assert!(!offline.online);
        assert_eq!(offline.user_id, user_id);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_within_grace_suppresses_offline() {
        let manager = manager(50);
        let user_id = Uuid::new_v4();
        let mut events = manager.subscribe();

        let first = conn(user_id);
        let first_id = first.connection_id;
        manager.register_connection(first).await.unwrap();
        let _ = events.try_recv(); // 消费上线事件

        // 页面刷新：断开后立刻重连
        assert_eq!(
            manager.deregister_connection(first_id).await.unwrap(),
            DeregisterOutcome::OfflinePending
        );
        manager.register_connection(conn(user_id)).await.unwrap();

        // 超过宽限期后也不应有任何离线/上线抖动
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(manager.is_online(user_id).await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_broadcast_after_grace() {
        let manager = manager(30);
        let user_id = Uuid::new_v4();
        let mut events = manager.subscribe();

        let connection = conn(user_id);
        let connection_id = connection.connection_id;
        manager.register_connection(connection).await.unwrap();
        let _ = events.try_recv();

        manager.deregister_connection(connection_id).await.unwrap();
        // 宽限期内仍视为在线
        assert!(manager.is_online(user_id).await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!manager.is_online(user_id).await);
        let change = events.try_recv().unwrap();
        assert!(!change.online);
    }

    #[tokio::test]
    async fn test_connection_capacity() {
        let manager = InMemoryPresenceManager::new(Duration::ZERO, 1);
        manager.register_connection(conn(Uuid::new_v4())).await.unwrap();

        let err = manager
            .register_connection(conn(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err, RealtimeError::CapacityExhausted);
    }

    #[tokio::test]
    async fn test_stats() {
        let manager = manager(0);
        let user_id = Uuid::new_v4();

        let first = conn(user_id);
        let first_id = first.connection_id;
        manager.register_connection(first).await.unwrap();
        manager.register_connection(conn(user_id)).await.unwrap();
        manager.deregister_connection(first_id).await.unwrap();

        let stats = manager.stats().await;
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.peak_connections, 2);
        assert_eq!(stats.online_users, 1);
    }
}
