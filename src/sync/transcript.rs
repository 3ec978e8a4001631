use std::fmt;

use chrono::{DateTime, Utc};

use crate::common::{MessageEnvelope, SentAt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Own,
    Other,
}

/// Một dòng đã hiển thị trong khung chat.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub side: Side,
    pub label: String,
    pub body: String,
    pub sent_at: Option<SentAt>,
    pub rendered_at: DateTime<Utc>,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.body)
    }
}

/// Khung chat chỉ thêm vào cuối, không bao giờ xoá hay sắp xếp lại.
///
/// No duplicate checking happens here; callers go through the ledger first.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    scroll_pending: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, envelope: MessageEnvelope, local_user_id: i64) -> &TranscriptEntry {
        let side = if envelope.sender_id == Some(local_user_id) {
            Side::Own
        } else {
            Side::Other
        };
        let label = envelope.label();
        self.entries.push(TranscriptEntry {
            side,
            label,
            body: envelope.body,
            sent_at: envelope.sent_at,
            rendered_at: Utc::now(),
        });
        self.scroll_pending = true;
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trả về true một lần sau mỗi lần có dòng mới, để UI cuộn xuống cuối.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }
}
