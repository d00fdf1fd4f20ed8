//! 领域实体定义
//!
//! 包含实时服务的核心实体：连接、在线状态、消息、通知、动态。

pub mod activity;
pub mod connection;
pub mod events;
pub mod identity;
pub mod message;
pub mod notification;
pub mod presence;

pub use activity::*;
pub use connection::*;
pub use events::*;
pub use identity::*;
pub use message::*;
pub use notification::*;
pub use presence::*;
