//! 内存连接投递
//!
//! 连接ID → 发送端 的映射。投递是尽力而为的：
//! 失败的连接记入计数与日志，不会让调用方出错。

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use async_trait::async_trait;
use domain::entities::ServerEvent;
use domain::errors::RealtimeError;
use domain::services::MessageRouter;

/// 内存连接投递器
#[derive(Default)]
pub struct InMemoryMessageRouter {
    senders: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>,
}

impl InMemoryMessageRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRouter for InMemoryMessageRouter {
    async fn register_sender(
        &self,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        let mut senders = self.senders.write().await;
        senders.insert(connection_id, sender);
    }

    async fn unregister_sender(&self, connection_id: Uuid) {
        let mut senders = self.senders.write().await;
        senders.remove(&connection_id);
    }

    async fn send_to_connection(
        &self,
        connection_id: Uuid,
        event: ServerEvent,
    ) -> Result<(), RealtimeError> {
        let senders = self.senders.read().await;
        let sender = senders
            .get(&connection_id)
            .ok_or(RealtimeError::ConnectionNotFound(connection_id))?;

        sender
            .send(event)
            .map_err(|err| RealtimeError::SendFailed(err.to_string()))?;

        debug!("Event routed to connection {}", connection_id);
        Ok(())
    }

    async fn send_to_connections(&self, connection_ids: &[Uuid], event: ServerEvent) -> usize {
        let senders = self.senders.read().await;
        let mut delivered = 0;

        for connection_id in connection_ids {
            match senders.get(connection_id) {
                Some(sender) if sender.send(event.clone()).is_ok() => delivered += 1,
                _ => warn!("Failed to route event to connection {}", connection_id),
            }
        }

        delivered
    }

    async fn broadcast(&self, event: ServerEvent) -> usize {
        let senders = self.senders.read().await;
        let mut delivered = 0;

        for (connection_id, sender) in senders.iter() {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!("Failed to broadcast to connection {}", connection_id);
            }
        }

        delivered
    }
}
