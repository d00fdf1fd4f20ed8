//! 通知实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entities::message::MessageEnvelope;

/// 通知类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// 新消息
    Message,
    /// 企业动态
    CompanyUpdate,
    /// 融资机会
    FundingOpportunity,
    /// 活动
    Event,
    /// 系统通知
    System,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationCategory::Message => "message",
            NotificationCategory::CompanyUpdate => "company_update",
            NotificationCategory::FundingOpportunity => "funding_opportunity",
            NotificationCategory::Event => "event",
            NotificationCategory::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// 通知实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// 通知ID（持久化时分配）
    pub id: Uuid,
    /// 目标用户ID
    pub user_id: Uuid,
    /// 通知类别
    pub category: NotificationCategory,
    /// 通知标题
    pub title: String,
    /// 通知内容
    pub body: String,
    /// 结构化载荷
    pub payload: JsonValue,
    /// 是否已读
    pub read: bool,
    /// 创建时间（持久化时分配）
    pub created_at: DateTime<Utc>,
    /// 阅读时间
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationEnvelope {
    /// 标记为已读
    pub fn mark_as_read(&mut self) {
        if !self.read {
            self.read = true;
            self.read_at = Some(Utc::now());
        }
    }
}

/// 待持久化的通知草稿
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
}

impl NewNotification {
    /// 创建新通知草稿
    pub fn new(
        user_id: Uuid,
        category: NotificationCategory,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            category,
            title: title.into(),
            body: body.into(),
            payload: JsonValue::Object(serde_json::Map::new()),
        }
    }

    /// 设置结构化载荷
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    /// 为离线消息构造补发通知
    ///
    /// 接收者离线时消息仍已持久化，这条通知保证下次连接时能补收到。
    pub fn for_message(message: &MessageEnvelope) -> Self {
        Self::new(
            message.recipient_id,
            NotificationCategory::Message,
            "您有一条新消息",
            message.content.clone(),
        )
        .with_payload(serde_json::json!({
            "message_id": message.id,
            "sender_id": message.sender_id,
            "kind": message.kind,
            "created_at": message.created_at,
        }))
    }
}
