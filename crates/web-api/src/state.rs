use std::sync::Arc;

use application::{ActivityService, MessageDispatcher, NotificationService, RealtimeGateway};
use config::RealtimeConfig;
use domain::services::{MessageRouter, PresenceManager, RoomManager, TokenVerifier};

/// 应用状态
///
/// 路由处理器共享的服务集合。可变共享状态都在各组件内部，
/// 这里只是只读的句柄包。
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub presence: Arc<dyn PresenceManager>,
    pub rooms: Arc<dyn RoomManager>,
    pub router: Arc<dyn MessageRouter>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub notifications: Arc<NotificationService>,
    pub activity: Arc<ActivityService>,
    pub gateway: Arc<RealtimeGateway>,
    pub realtime: RealtimeConfig,
}
