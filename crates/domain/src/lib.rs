//! 实时在线与消息协调服务的核心领域模型
//!
//! 包含连接、在线状态、消息、通知等核心实体，
//! 以及存储协作方与实时组件的接口定义。

pub mod entities;
pub mod errors;
pub mod services;
pub mod stores;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use services::*;
pub use stores::*;
