use std::fmt;

use serde::{Deserialize, Serialize};

/// Token thứ tự do server gán cho mỗi tin nhắn (thường là timestamp).
///
/// Only equality matters on the client: the token is the dedup identity of a
/// message within one conversation, never compared across conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentAt(pub String);

impl fmt::Display for SentAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Một tin nhắn chat cùng metadata, như được trao đổi trên kênh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub body: String,
    pub sender_id: Option<i64>,
    pub sender_display_name: Option<String>,
    pub sent_at: Option<SentAt>,
}

impl MessageEnvelope {
    /// Label shown next to the message body.
    pub fn label(&self) -> String {
        match (&self.sender_display_name, self.sender_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("user {id}"),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// Vòng đời của kênh realtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        };
        f.write_str(text)
    }
}

/// Kết quả tìm kiếm người dùng từ directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}
