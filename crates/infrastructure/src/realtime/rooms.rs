//! 内存房间路由
//!
//! 房间→连接 与 连接→房间 两个索引在同一把锁下变更，
//! `leave_all` 之后任何房间都不会残留该连接的成员记录。

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use async_trait::async_trait;
use domain::services::RoomManager;

#[derive(Default)]
struct RoomState {
    room_members: HashMap<String, HashSet<Uuid>>,
    connection_rooms: HashMap<Uuid, HashSet<String>>,
}

/// 内存房间路由
#[derive(Default)]
pub struct InMemoryRoomManager {
    state: RwLock<RoomState>,
}

impl InMemoryRoomManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomManager for InMemoryRoomManager {
    async fn join(&self, connection_id: Uuid, room_id: &str) {
        let mut state = self.state.write().await;
        state
            .room_members
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id);
        state
            .connection_rooms
            .entry(connection_id)
            .or_default()
            .insert(room_id.to_string());
        debug!("Connection {} joined room {}", connection_id, room_id);
    }

    async fn leave(&self, connection_id: Uuid, room_id: &str) {
        let mut state = self.state.write().await;
        if let Some(members) = state.room_members.get_mut(room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                state.room_members.remove(room_id);
            }
        }
        if let Some(rooms) = state.connection_rooms.get_mut(&connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                state.connection_rooms.remove(&connection_id);
            }
        }
    }

    async fn leave_all(&self, connection_id: Uuid) -> Vec<String> {
        let mut state = self.state.write().await;
        let rooms = match state.connection_rooms.remove(&connection_id) {
            Some(rooms) => rooms,
            None => return Vec::new(),
        };
        for room_id in &rooms {
            if let Some(members) = state.room_members.get_mut(room_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    state.room_members.remove(room_id);
                }
            }
        }
        debug!(
            "Connection {} left {} room(s) on disconnect",
            connection_id,
            rooms.len()
        );
        rooms.into_iter().collect()
    }

    async fn members_of(&self, room_id: &str) -> Vec<Uuid> {
        let state = self.state.read().await;
        state
            .room_members
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    async fn rooms_of(&self, connection_id: Uuid) -> Vec<String> {
        let state = self.state.read().await;
        state
            .connection_rooms
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn is_member(&self, connection_id: Uuid, room_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .room_members
            .get(room_id)
            .map(|members| members.contains(&connection_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_and_leave() {
        let rooms = InMemoryRoomManager::new();
        let connection_id = Uuid::new_v4();

        rooms.join(connection_id, "administrators").await;
        assert!(rooms.is_member(connection_id, "administrators").await);
        assert_eq!(rooms.members_of("administrators").await, vec![connection_id]);

        rooms.leave(connection_id, "administrators").await;
        assert!(!rooms.is_member(connection_id, "administrators").await);
        assert!(rooms.members_of("administrators").await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_all_purges_every_room() {
        let rooms = InMemoryRoomManager::new();
        let connection_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        for room in ["a", "b", "c"] {
            rooms.join(connection_id, room).await;
        }
        rooms.join(other, "b").await;

        let mut left = rooms.leave_all(connection_id).await;
        left.sort();
        assert_eq!(left, vec!["a", "b", "c"]);

        // 断开后任何房间都不应再包含该连接
        for room in ["a", "b", "c"] {
            assert!(!rooms.members_of(room).await.contains(&connection_id));
        }
        // 其他连接的成员关系不受影响
        assert!(rooms.is_member(other, "b").await);

        // 幂等：再次调用返回空
        assert!(rooms.leave_all(connection_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_connection_in_multiple_rooms() {
        let rooms = InMemoryRoomManager::new();
        let connection_id = Uuid::new_v4();

        rooms.join(connection_id, "x").await;
        rooms.join(connection_id, "y").await;
        // 重复加入不产生重复记录
        rooms.join(connection_id, "x").await;

        let mut joined = rooms.rooms_of(connection_id).await;
        joined.sort();
        assert_eq!(joined, vec!["x", "y"]);
    }
}
