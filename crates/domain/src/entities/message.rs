//! 消息实体定义
//!
//! 一条点对点直达消息。消息ID与时间戳由存储协作方在持久化时分配。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// 文本
    Text,
    /// 文件
    File,
    /// 图片
    Image,
    /// 语音
    Voice,
    /// 系统消息
    System,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::File => "file",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// 附件引用
///
/// 文件本体由平台的上传服务托管，这里只保留引用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// 文件名
    pub file_name: String,
    /// 访问地址
    pub url: String,
    /// MIME类型
    pub mime_type: Option<String>,
    /// 文件大小（字节）
    pub size_bytes: Option<u64>,
}

/// 消息实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// 消息ID（持久化时分配）
    pub id: Uuid,
    /// 发送者用户ID
    pub sender_id: Uuid,
    /// 接收者用户ID
    pub recipient_id: Uuid,
    /// 内容
    pub content: String,
    /// 消息类型
    pub kind: MessageKind,
    /// 附件引用列表
    pub attachments: Vec<AttachmentRef>,
    /// 回复的消息ID（可选）
    pub reply_to: Option<Uuid>,
    /// 接收者是否已读
    pub read: bool,
    /// 创建时间（持久化时分配）
    pub created_at: DateTime<Utc>,
}

impl MessageEnvelope {
    /// 是否为回复消息
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// 是否携带附件
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// 待持久化的消息草稿
///
/// 由消息分发器在校验通过后构造，交给存储协作方分配ID与时间戳。
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub attachments: Vec<AttachmentRef>,
    pub reply_to: Option<Uuid>,
}

impl NewMessage {
    /// 创建纯文本消息草稿
    pub fn text(sender_id: Uuid, recipient_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            recipient_id,
            content: content.into(),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            reply_to: None,
        }
    }
}
