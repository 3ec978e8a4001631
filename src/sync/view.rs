use uuid::Uuid;

use crate::common::{ChannelState, ChatError, ConnectionEvent};

use super::codec;
use super::ledger::{Admission, Ledger};
use super::transcript::Transcript;

/// Kết quả xử lý một frame nhận từ kênh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Rendered,
    DuplicateSuppressed,
    Malformed,
}

/// Phiên chat phía client với đúng một người đối diện.
///
/// Owns the ledger and the transcript, so decode, admission and rendering of
/// one frame happen inside a single `&mut self` call.
#[derive(Debug)]
pub struct ConversationView {
    id: Uuid,
    local_user_id: i64,
    peer_id: i64,
    channel_state: ChannelState,
    connection_lost: Option<ChatError>,
    ledger: Ledger,
    transcript: Transcript,
}

impl ConversationView {
    pub fn new(local_user_id: i64, peer_id: i64) -> Self {
        let id = Uuid::new_v4();
        log::info!("[view {id}] chat {local_user_id} -> {peer_id} created");
        Self {
            id,
            local_user_id,
            peer_id,
            channel_state: ChannelState::Connecting,
            connection_lost: None,
            ledger: Ledger::new(),
            transcript: Transcript::new(),
        }
    }

    pub fn peer_id(&self) -> i64 {
        self.peer_id
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel_state
    }

    /// Why the channel closed, if it closed unexpectedly.
    pub fn connection_lost(&self) -> Option<&ChatError> {
        self.connection_lost.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Applies one connection event. Returns the delivery outcome for frames.
    pub fn apply(&mut self, event: ConnectionEvent) -> Option<Delivery> {
        match event {
            ConnectionEvent::Opened => {
                if self.channel_state == ChannelState::Connecting {
                    self.channel_state = ChannelState::Open;
                    log::info!("[view {}] channel open", self.id);
                }
                None
            }
            ConnectionEvent::Frame(bytes) => {
                if self.channel_state == ChannelState::Closed {
                    log::debug!("[view {}] frame after close ignored", self.id);
                    return None;
                }
                Some(self.deliver(&bytes))
            }
            ConnectionEvent::Closed(reason) => {
                if self.channel_state == ChannelState::Closed {
                    return None;
                }
                self.channel_state = ChannelState::Closed;
                if reason.is_unexpected() {
                    let err = ChatError::ConnectionLost(reason.describe());
                    log::error!("[view {}] {err}", self.id);
                    self.connection_lost = Some(err);
                } else {
                    log::info!("[view {}] channel closed", self.id);
                }
                None
            }
        }
    }

    pub fn deliver(&mut self, frame: &[u8]) -> Delivery {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("[view {}] dropping frame: {err}", self.id);
                return Delivery::Malformed;
            }
        };

        match self.ledger.admit(&envelope) {
            Admission::Admit => {
                self.transcript.render(envelope, self.local_user_id);
                Delivery::Rendered
            }
            Admission::Reject => {
                log::debug!(
                    "[view {}] duplicate suppressed ({} messages seen)",
                    self.id,
                    self.ledger.len()
                );
                Delivery::DuplicateSuppressed
            }
        }
    }
}
