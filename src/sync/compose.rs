use crate::common::ChatError;

/// Đầu ra của đường gửi: nhận nội dung đã trim, trả về ngay không chờ mạng.
pub trait OutboundChannel {
    fn send(&self, body: &str) -> Result<(), ChatError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Whitespace-only input; nothing was sent.
    Empty,
    Enqueued,
    Rejected(String),
}

/// Ô soạn tin. Chỉ xoá nội dung khi frame đã được đưa vào kênh.
///
/// Sent messages are not echoed locally; they show up once the server
/// broadcasts them back.
#[derive(Debug, Default)]
pub struct ComposeBox {
    input: String,
    error: Option<String>,
}

impl ComposeBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Last send failure, cleared by the next successful send.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn submit(&mut self, channel: &impl OutboundChannel) -> SubmitOutcome {
        let body = self.input.trim();
        if body.is_empty() {
            return SubmitOutcome::Empty;
        }

        match channel.send(body) {
            Ok(()) => {
                self.input.clear();
                self.error = None;
                SubmitOutcome::Enqueued
            }
            Err(err) => {
                log::warn!("Send rejected, keeping input: {err}");
                let message = err.to_string();
                self.error = Some(message.clone());
                SubmitOutcome::Rejected(message)
            }
        }
    }
}
