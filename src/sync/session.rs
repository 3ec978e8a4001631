use tokio::sync::mpsc;

use crate::common::{ChannelState, ChatError, ConnectionEvent};
use crate::network::connection::{self, Connection};

use super::compose::{ComposeBox, SubmitOutcome};
use super::view::{ConversationView, Delivery};

/// Một cuộc trò chuyện đang mở: view, kết nối và ô soạn tin đi cùng nhau.
///
/// All view mutation goes through this struct on one task, so events are
/// applied strictly in the order the connection produced them.
pub struct ChatSession {
    view: ConversationView,
    connection: Connection,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    compose: ComposeBox,
}

impl ChatSession {
    pub fn open(local_user_id: i64, peer_id: i64, address: &str) -> Result<Self, ChatError> {
        let (connection, events) = connection::open(address)?;
        Ok(Self {
            view: ConversationView::new(local_user_id, peer_id),
            connection,
            events,
            compose: ComposeBox::new(),
        })
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ConversationView {
        &mut self.view
    }

    pub fn compose(&self) -> &ComposeBox {
        &self.compose
    }

    pub fn compose_mut(&mut self) -> &mut ComposeBox {
        &mut self.compose
    }

    /// Live transport state; decides whether sending is allowed. The view's
    /// own state only advances as events are applied and drives what is shown.
    pub fn channel_state(&self) -> ChannelState {
        self.connection.state()
    }

    /// Applies every event already queued, without waiting.
    /// Returns how many new entries were rendered.
    pub fn pump(&mut self) -> usize {
        let mut rendered = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.view.apply(event) == Some(Delivery::Rendered) {
                rendered += 1;
            }
        }
        rendered
    }

    /// Waits for the next connection event and applies it.
    ///
    /// Returns `None` once the connection has closed and every event has been
    /// consumed.
    pub async fn next_event(&mut self) -> Option<Option<Delivery>> {
        let event = self.events.recv().await?;
        Some(self.view.apply(event))
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        self.compose.submit(&self.connection)
    }

    pub fn close(&self) {
        self.connection.close();
    }
}
