//! 应用层实现。
//!
//! 这里提供实时协调的用例服务：消息分发（校验、持久化、扇出、
//! 输入状态定时器）、通知补发、动态广播，以及暴露给平台其他
//! 模块的推送网关。共享状态的持有方都在基础设施层，应用层
//! 只通过领域接口编排。

pub mod activity;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod notifications;

pub use activity::ActivityService;
pub use dispatcher::{DispatcherDependencies, MessageDispatcher, SendMessageRequest};
pub use error::{ApplicationError, ApplicationResult};
pub use gateway::RealtimeGateway;
pub use notifications::NotificationService;
