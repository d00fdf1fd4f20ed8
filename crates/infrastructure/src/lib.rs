//! 基础设施层实现。
//!
//! 提供领域层接口的具体适配器：内存在线状态注册表、房间路由、
//! 连接投递、JWT凭证校验，以及代表平台存储层的内存存储实现。

pub mod identity;
pub mod realtime;
pub mod storage;

pub use identity::{issue_token, InMemoryAccountDirectory, JwtTokenVerifier};
pub use realtime::{InMemoryMessageRouter, InMemoryPresenceManager, InMemoryRoomManager};
pub use storage::{InMemoryActivityStore, InMemoryMessageStore, InMemoryNotificationStore};
