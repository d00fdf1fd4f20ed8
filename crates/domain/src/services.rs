//! 实时服务接口
//!
//! 定义在线状态注册表、房间路由、连接投递与身份校验的核心接口。
//! 注册表与房间路由是系统中仅有的可变共享状态，
//! 所有变更必须经过这里暴露的操作，外部组件不得直接触碰底层映射。

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::entities::{
    AccountRecord, AuthenticatedUser, ConnectionInfo, ConnectionStats, DeregisterOutcome,
    PresenceChange, PresenceEntry, RegisterOutcome, ServerEvent,
};
use crate::errors::{AuthError, RealtimeError, StorageResult};

/// 管理员广播房间（按角色在连接时自动加入）
pub const ADMIN_ROOM: &str = "administrators";

/// 用户的个人通知频道
pub fn personal_room(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// 在线状态注册表接口
///
/// 每个用户的状态机：离线 →（首个连接注册）→ 在线 →（最后一个连接注销，
/// 度过宽限期）→ 离线。宽限期内重连不会产生离线/在线抖动。
#[async_trait]
pub trait PresenceManager: Send + Sync {
    /// 注册新连接
    async fn register_connection(
        &self,
        connection: ConnectionInfo,
    ) -> Result<RegisterOutcome, RealtimeError>;

    /// 注销连接
    async fn deregister_connection(
        &self,
        connection_id: Uuid,
    ) -> Result<DeregisterOutcome, RealtimeError>;

    /// 用户是否在线
    async fn is_online(&self, user_id: Uuid) -> bool;

    /// 所有在线用户
    async fn online_users(&self) -> Vec<PresenceEntry>;

    /// 在线用户数
    async fn online_count(&self) -> usize;

    /// 用户的所有活跃连接ID
    async fn user_connections(&self, user_id: Uuid) -> Vec<Uuid>;

    /// 获取连接信息
    async fn get_connection(&self, connection_id: Uuid) -> Option<ConnectionInfo>;

    /// 更新连接活跃时间
    async fn touch(&self, connection_id: Uuid) -> Result<(), RealtimeError>;

    /// 记录连接当前所在的房间
    async fn set_current_room(
        &self,
        connection_id: Uuid,
        room_id: Option<String>,
    ) -> Result<(), RealtimeError>;

    /// 订阅在线状态变更事件
    fn subscribe(&self) -> broadcast::Receiver<PresenceChange>;

    /// 连接统计信息
    async fn stats(&self) -> ConnectionStats;
}

/// 房间路由接口
///
/// 维护逻辑广播组的成员关系。一个连接可以同时属于多个房间；
/// 连接关闭时 `leave_all` 必须保证没有任何房间残留它的成员记录。
#[async_trait]
pub trait RoomManager: Send + Sync {
    /// 连接加入房间
    async fn join(&self, connection_id: Uuid, room_id: &str);

    /// 连接离开房间
    async fn leave(&self, connection_id: Uuid, room_id: &str);

    /// 连接离开所有房间，返回离开的房间列表（幂等）
    async fn leave_all(&self, connection_id: Uuid) -> Vec<String>;

    /// 房间内的所有连接
    async fn members_of(&self, room_id: &str) -> Vec<Uuid>;

    /// 连接所在的房间列表
    async fn rooms_of(&self, connection_id: Uuid) -> Vec<String>;

    /// 连接是否在房间内
    async fn is_member(&self, connection_id: Uuid, room_id: &str) -> bool;
}

/// 连接投递接口
///
/// 只负责 连接ID → 发送端 的映射；用户/房间到连接的解析
/// 由调用方通过注册表与房间路由完成。投递是尽力而为的，
/// 失败的连接计入返回值但不会让调用方出错。
#[async_trait]
pub trait MessageRouter: Send + Sync {
    /// 注册连接的发送端
    async fn register_sender(
        &self,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    );

    /// 注销连接的发送端
    async fn unregister_sender(&self, connection_id: Uuid);

    /// 投递事件到单个连接
    async fn send_to_connection(
        &self,
        connection_id: Uuid,
        event: ServerEvent,
    ) -> Result<(), RealtimeError>;

    /// 投递事件到多个连接，返回成功投递的数量
    async fn send_to_connections(&self, connection_ids: &[Uuid], event: ServerEvent) -> usize;

    /// 广播事件到所有连接，返回成功投递的数量
    async fn broadcast(&self, event: ServerEvent) -> usize;
}

/// 凭证校验接口
///
/// `verify(credential) -> 身份 | 失败`，无副作用。
/// 校验失败的连接由生命周期控制直接拒绝，本服务不支持匿名会话。
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// 账户目录接口（身份协作方）
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// 查找账户记录（包含停用账户，由调用方检查 active）
    async fn find_account(&self, user_id: Uuid) -> StorageResult<Option<AccountRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_room_format() {
        let user_id = Uuid::new_v4();
        assert_eq!(personal_room(user_id), format!("user:{}", user_id));
    }
}
