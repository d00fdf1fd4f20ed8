//! 实时组件的内存实现
//!
//! 在线状态注册表、房间路由与连接投递。三者是系统中仅有的
//! 可变共享状态，各自把两个方向的索引放在同一把锁下，
//! 保证任何一次变更都不会让两个视图出现分歧。

pub mod presence;
pub mod rooms;
pub mod router;

pub use presence::InMemoryPresenceManager;
pub use rooms::InMemoryRoomManager;
pub use router::InMemoryMessageRouter;
