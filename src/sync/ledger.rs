use std::collections::HashSet;

use crate::common::{MessageEnvelope, SentAt};

/// Khoá chống trùng lặp của một tin nhắn.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LedgerKey {
    Token(SentAt),
    /// Used only when the server sent no ordering token. Two distinct messages
    /// with the same sender label and identical text share this key, so the
    /// second one is dropped.
    Content { sender: String, body: String },
}

impl LedgerKey {
    fn for_envelope(envelope: &MessageEnvelope) -> Self {
        match &envelope.sent_at {
            Some(token) => LedgerKey::Token(token.clone()),
            None => LedgerKey::Content {
                sender: envelope.sender_display_name.clone().unwrap_or_default(),
                body: envelope.body.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject,
}

/// Sổ ghi các tin nhắn đã hiển thị trong một view.
///
/// Grows for the lifetime of the view. A long-lived view would want a bounded
/// LRU here.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: HashSet<LedgerKey>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, envelope: &MessageEnvelope) -> Admission {
        if self.seen.insert(LedgerKey::for_envelope(envelope)) {
            Admission::Admit
        } else {
            Admission::Reject
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str, sender: Option<&str>, token: Option<&str>) -> MessageEnvelope {
        MessageEnvelope {
            body: body.to_string(),
            sender_id: None,
            sender_display_name: sender.map(str::to_string),
            sent_at: token.map(|token| SentAt(token.to_string())),
        }
    }

    #[test]
    fn same_token_admitted_once() {
        let mut ledger = Ledger::new();
        let first = envelope("hi", Some("bob"), Some("t1"));
        assert_eq!(ledger.admit(&first), Admission::Admit);
        assert_eq!(ledger.admit(&first), Admission::Reject);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn token_is_the_identity_not_the_content() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.admit(&envelope("hi", Some("bob"), Some("t1"))),
            Admission::Admit
        );
        // Same text again under a fresh token is a new message.
        assert_eq!(
            ledger.admit(&envelope("hi", Some("bob"), Some("t2"))),
            Admission::Admit
        );
        // Edited content under a seen token is still a replay.
        assert_eq!(
            ledger.admit(&envelope("changed", Some("bob"), Some("t1"))),
            Admission::Reject
        );
    }

    #[test]
    fn content_fallback_without_token() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.admit(&envelope("hi", Some("bob"), None)), Admission::Admit);
        assert_eq!(ledger.admit(&envelope("hi", Some("bob"), None)), Admission::Reject);
        assert_eq!(ledger.admit(&envelope("hi", Some("amy"), None)), Admission::Admit);
        assert_eq!(ledger.admit(&envelope("hey", Some("bob"), None)), Admission::Admit);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn token_and_content_keys_do_not_collide() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.admit(&envelope("hi", Some("bob"), Some("t1"))), Admission::Admit);
        assert_eq!(ledger.admit(&envelope("hi", Some("bob"), None)), Admission::Admit);
    }
}
