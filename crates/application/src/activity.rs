//! 动态服务
//!
//! 平台的业务模块（企业主页、融资流程、活动报名）通过这里
//! 把用户动态广播给本人的其他设备与管理员。与通知不同，
//! 动态的持久化是尽力而为，失败只记日志，不影响广播。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use domain::entities::{ActivityEnvelope, NewActivity, ServerEvent};
use domain::services::{MessageRouter, PresenceManager, RoomManager, ADMIN_ROOM};
use domain::stores::ActivityStore;

/// 动态服务
pub struct ActivityService {
    store: Arc<dyn ActivityStore>,
    presence: Arc<dyn PresenceManager>,
    rooms: Arc<dyn RoomManager>,
    router: Arc<dyn MessageRouter>,
}

impl ActivityService {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        presence: Arc<dyn PresenceManager>,
        rooms: Arc<dyn RoomManager>,
        router: Arc<dyn MessageRouter>,
    ) -> Self {
        Self {
            store,
            presence,
            rooms,
            router,
        }
    }

    /// 发布用户动态
    ///
    /// 接收方是该用户自己的其他设备与管理员房间（去重后各一份）；
    /// `origin_connection` 指明触发动作的连接，它不收自己的回声。
    pub async fn publish(
        &self,
        user_id: Uuid,
        activity_type: &str,
        payload: JsonValue,
        origin_connection: Option<Uuid>,
    ) -> ActivityEnvelope {
        let envelope = match self
            .store
            .save_activity(NewActivity {
                user_id,
                activity_type: activity_type.to_string(),
                payload: payload.clone(),
            })
            .await
        {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    "Activity persistence failed, broadcasting unpersisted copy: {}",
                    err
                );
                ActivityEnvelope::new(user_id, activity_type, payload)
            }
        };

        let mut targets: HashSet<Uuid> =
            self.presence.user_connections(user_id).await.into_iter().collect();
        for connection_id in self.rooms.members_of(ADMIN_ROOM).await {
            targets.insert(connection_id);
        }
        if let Some(origin) = origin_connection {
            targets.remove(&origin);
        }

        if !targets.is_empty() {
            let targets: Vec<Uuid> = targets.into_iter().collect();
            self.router
                .send_to_connections(
                    &targets,
                    ServerEvent::ActivityBroadcast {
                        activity: envelope.clone(),
                    },
                )
                .await;
        }

        envelope
    }
}
