//! 主应用程序入口
//!
//! 装配内存基础设施与协调服务，启动 Axum 实时网关。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ActivityService, DispatcherDependencies, MessageDispatcher, NotificationService,
    RealtimeGateway,
};
use config::AppConfig;
use domain::services::{
    AccountDirectory, MessageRouter, PresenceManager, RoomManager, TokenVerifier,
};
use infrastructure::{
    InMemoryAccountDirectory, InMemoryActivityStore, InMemoryMessageRouter, InMemoryMessageStore,
    InMemoryNotificationStore, InMemoryPresenceManager, InMemoryRoomManager, JwtTokenVerifier,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env();
    config.validate()?;

    // 实时组件：在线状态注册表、房间路由、连接投递
    let presence: Arc<dyn PresenceManager> =
        Arc::new(InMemoryPresenceManager::from_config(&config.realtime));
    let rooms: Arc<dyn RoomManager> = Arc::new(InMemoryRoomManager::new());
    let message_router: Arc<dyn MessageRouter> = Arc::new(InMemoryMessageRouter::new());

    // 存储协作方（生产部署由平台的数据库实现替换）
    let message_store = Arc::new(InMemoryMessageStore::new());
    let notification_store = Arc::new(InMemoryNotificationStore::new());
    let activity_store = Arc::new(InMemoryActivityStore::new());

    // 身份协作方：账户目录 + JWT 校验
    let directory = Arc::new(InMemoryAccountDirectory::new());
    let allowed_roles = JwtTokenVerifier::parse_allowed_roles(&config.realtime.allowed_roles);
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtTokenVerifier::new(
        &config.jwt.secret,
        directory.clone() as Arc<dyn AccountDirectory>,
        allowed_roles,
    ));

    // 协调服务
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
        typing_idle: Duration::from_secs(config.realtime.typing_idle_secs),
        max_message_bytes: config.realtime.max_message_bytes,
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

    // 在线状态变更扇出
    let _presence_fanout = gateway.spawn_presence_fanout();

    // 创建应用状态
    let state = AppState {
        verifier,
        presence,
        rooms,
        router: message_router,
        dispatcher,
        notifications,
        activity,
        gateway,
        realtime: config.realtime.clone(),
    };

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("实时网关启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
