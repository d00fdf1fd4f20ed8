//! WebSocket 集成测试的公共装配
//!
//! 在随机端口上起一个完整装配的实时网关，
//! 用 tokio-tungstenite 作为客户端驱动真实的连接。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use application::{
    ActivityService, DispatcherDependencies, MessageDispatcher, NotificationService,
    RealtimeGateway,
};
use config::RealtimeConfig;
use domain::entities::UserRole;
use domain::services::{AccountDirectory, MessageRouter, PresenceManager, RoomManager, TokenVerifier};
use infrastructure::{
    issue_token, InMemoryAccountDirectory, InMemoryActivityStore, InMemoryMessageRouter,
    InMemoryMessageStore, InMemoryNotificationStore, InMemoryPresenceManager,
    InMemoryRoomManager, JwtTokenVerifier,
};
use web_api::{router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret-key-0123456789abcdef";

/// 断言"什么都不该到"时的观察窗口
pub const SILENCE_WINDOW: Duration = Duration::from_millis(300);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestApp {
    pub addr: SocketAddr,
    pub directory: Arc<InMemoryAccountDirectory>,
}

impl TestApp {
    /// 默认装配：50ms 离线宽限期
    pub async fn spawn() -> Self {
        Self::spawn_with(50, 30).await
    }

    pub async fn spawn_with(grace_ms: u64, typing_idle_secs: u64) -> Self {
        let realtime = RealtimeConfig {
            presence_offline_grace_ms: grace_ms,
            typing_idle_secs,
            handshake_timeout_secs: 5,
            max_connections: 100,
            max_message_bytes: 8192,
            presence_channel_capacity: 64,
            allowed_roles: vec![
                "member".to_string(),
                "admin".to_string(),
                "super_admin".to_string(),
            ],
        };

        let presence: Arc<dyn PresenceManager> =
            Arc::new(InMemoryPresenceManager::from_config(&realtime));
        let rooms: Arc<dyn RoomManager> = Arc::new(InMemoryRoomManager::new());
        let message_router: Arc<dyn MessageRouter> = Arc::new(InMemoryMessageRouter::new());

        let message_store = Arc::new(InMemoryMessageStore::new());
        let notification_store = Arc::new(InMemoryNotificationStore::new());
        let activity_store = Arc::new(InMemoryActivityStore::new());

        let directory = Arc::new(InMemoryAccountDirectory::new());
        let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtTokenVerifier::new(
            TEST_SECRET,
            directory.clone() as Arc<dyn AccountDirectory>,
            JwtTokenVerifier::parse_allowed_roles(&realtime.allowed_roles),
        ));

        let notifications = Arc::new(NotificationService::new(
            notification_store,
            presence.clone(),
            message_router.clone(),
        ));
        let dispatcher = Arc::new(MessageDispatcher::new(DispatcherDependencies {
            presence: presence.clone(),
            router: message_router.clone(),
            directory: directory.clone() as Arc<dyn AccountDirectory>,
            messages: message_store,
            notifications: notifications.clone(),
            typing_idle: Duration::from_secs(typing_idle_secs),
            max_message_bytes: realtime.max_message_bytes,
        }));
        let activity = Arc::new(ActivityService::new(
            activity_store,
            presence.clone(),
            rooms.clone(),
            message_router.clone(),
        ));
        let gateway = Arc::new(RealtimeGateway::new(
            presence.clone(),
            rooms.clone(),
            message_router.clone(),
        ));
        let _fanout = gateway.spawn_presence_fanout();

        let state = AppState {
            verifier,
            presence,
            rooms,
            router: message_router,
            dispatcher,
            notifications,
            activity,
            gateway,
            realtime,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = router(state);

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.ok();
        });

        Self { addr, directory }
    }

    /// 预置账户并签发其token
    pub async fn seed_user(&self, role: UserRole, email: &str) -> (Uuid, String) {
        let user_id = self.directory.seed(role, email).await;
        let token = issue_token(TEST_SECRET, user_id, 1);
        (user_id, token)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/api/v1/ws?token={}", self.addr, token)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// 建立一条已认证的WebSocket连接
    pub async fn connect(&self, token: &str) -> WsClient {
        let (ws, _) = connect_async(self.ws_url(token)).await.expect("ws connect");
        ws
    }
}

/// 等待指定类型的事件出现，途中跳过其他事件
pub async fn expect_event(
    ws: &mut WsClient,
    event_type: &str,
    wait: Duration,
) -> serde_json::Value {
    let started = std::time::Instant::now();
    loop {
        let remaining = match wait.checked_sub(started.elapsed()) {
            Some(remaining) => remaining,
            None => break,
        };
        let message = tokio::time::timeout(remaining, ws.next())
            .await
            .unwrap_or_else(|_| panic!("等待 {} 事件超时", event_type))
            .expect("连接意外结束")
            .expect("读取消息失败");
        if let WsMessage::Text(text) = message {
            let value: serde_json::Value =
                serde_json::from_str(text.as_str()).expect("事件应为合法JSON");
            if value["type"] == event_type {
                return value;
            }
        }
    }
    panic!("等待 {} 事件超时", event_type);
}

/// 在观察窗口内收集所有到达的事件
pub async fn collect_events(ws: &mut WsClient, window: Duration) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    let started = std::time::Instant::now();
    loop {
        let remaining = match window.checked_sub(started.elapsed()) {
            Some(remaining) => remaining,
            None => break,
        };
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => {
                if let Ok(value) = serde_json::from_str(text.as_str()) {
                    events.push(value);
                }
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => break,
        }
    }
    events
}

pub fn count_of(events: &[serde_json::Value], event_type: &str) -> usize {
    events.iter().filter(|e| e["type"] == event_type).count()
}

/// 发送一个客户端事件
pub async fn send_event(ws: &mut WsClient, event: serde_json::Value) {
    use futures_util::SinkExt;
    ws.send(WsMessage::Text(event.to_string().into()))
        .await
        .expect("send event");
}
