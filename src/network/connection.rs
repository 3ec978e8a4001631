use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{ChannelState, ChatError, CloseReason, ConnectionEvent, OutboundCommand};
use crate::sync::OutboundChannel;
use crate::sync::codec;

/// Handle phía view của một kênh realtime.
///
/// Dropping the handle closes the channel.
pub struct Connection {
    command_sender: mpsc::UnboundedSender<OutboundCommand>,
    state: watch::Receiver<ChannelState>,
}

/// Mở kênh tới `address` mà không chờ handshake.
///
/// The returned receiver yields `Opened`, then frames in arrival order, then
/// exactly one `Closed`. Must be called from inside a tokio runtime.
pub fn open(
    address: &str,
) -> Result<(Connection, mpsc::UnboundedReceiver<ConnectionEvent>), ChatError> {
    let url = url::Url::parse(address)
        .map_err(|err| ChatError::InvalidAddress(format!("{address}: {err}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ChatError::InvalidAddress(format!(
            "{address}: expected ws:// or wss://"
        )));
    }

    let (command_sender, command_receiver) = mpsc::unbounded_channel();
    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let (state_sender, state) = watch::channel(ChannelState::Connecting);

    tokio::spawn(drive(
        url.to_string(),
        state_sender,
        command_receiver,
        event_sender,
    ));

    Ok((
        Connection {
            command_sender,
            state,
        },
        event_receiver,
    ))
}

impl Connection {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn close(&self) {
        let _ = self.command_sender.send(OutboundCommand::Close);
    }
}

impl OutboundChannel for Connection {
    fn send(&self, body: &str) -> Result<(), ChatError> {
        if self.state() != ChannelState::Open {
            return Err(ChatError::NotOpen);
        }
        let frame = codec::encode(body)?;
        self.command_sender
            .send(OutboundCommand::Frame(frame))
            .map_err(|_| ChatError::NotOpen)
    }
}

async fn drive(
    address: String,
    state: watch::Sender<ChannelState>,
    mut command_receiver: mpsc::UnboundedReceiver<OutboundCommand>,
    event_sender: mpsc::UnboundedSender<ConnectionEvent>,
) {
    log::info!("Connecting to {address}");
    let handshake = connect_async(address.as_str());
    tokio::pin!(handshake);
    // Rời view trong lúc đang bắt tay cũng phải đóng kênh.
    let ws_stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((ws_stream, _)) => break ws_stream,
                Err(err) => {
                    log::error!("WebSocket connection to {address} failed: {err}");
                    finish(&state, &event_sender, CloseReason::Failed(err.to_string()));
                    return;
                }
            },
            command = command_receiver.recv() => match command {
                Some(OutboundCommand::Frame(_)) => {
                    log::debug!("Frame dropped before the handshake completed");
                }
                Some(OutboundCommand::Close) | None => {
                    log::info!("Channel to {address} closed while connecting");
                    finish(&state, &event_sender, CloseReason::Local);
                    return;
                }
            },
        }
    };

    state.send_replace(ChannelState::Open);
    let _ = event_sender.send(ConnectionEvent::Opened);
    log::info!("WebSocket connected to {address}");

    let (mut write, mut read) = ws_stream.split();
    let reason = loop {
        tokio::select! {
            command = command_receiver.recv() => match command {
                Some(OutboundCommand::Frame(frame)) => {
                    if let Err(err) = write.send(Message::Text(frame)).await {
                        log::error!("WebSocket send error: {err}");
                        break CloseReason::Failed(err.to_string());
                    }
                }
                Some(OutboundCommand::Close) | None => {
                    if let Err(err) = write.send(Message::Close(None)).await {
                        log::debug!("Close frame not delivered: {err}");
                    }
                    break CloseReason::Local;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_sender.send(ConnectionEvent::Frame(text.into_bytes()));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = event_sender.send(ConnectionEvent::Frame(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => CloseReason::Remote {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.to_string(),
                        },
                        None => CloseReason::Remote { code: None, reason: String::new() },
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::error!("WebSocket error: {err}");
                    break CloseReason::Failed(err.to_string());
                }
                None => break CloseReason::Remote { code: None, reason: String::new() },
            },
        }
    };

    finish(&state, &event_sender, reason);
}

/// Trạng thái chuyển sang Closed trước khi phát sự kiện, nên sau khi view
/// thấy `Closed` thì mọi lần `send` đều thất bại.
fn finish(
    state: &watch::Sender<ChannelState>,
    event_sender: &mpsc::UnboundedSender<ConnectionEvent>,
    reason: CloseReason,
) {
    state.send_replace(ChannelState::Closed);
    log::info!("Channel closed: {}", reason.describe());
    let _ = event_sender.send(ConnectionEvent::Closed(reason));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn next_event(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for connection event")
            .expect("event channel closed")
    }

    /// Server một kết nối: echo lại mỗi frame như server thật sẽ broadcast.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut counter = 0;
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    counter += 1;
                    let body = codec::decode_outbound(text.as_bytes()).unwrap();
                    let echo = serde_json::json!({
                        "message": body,
                        "sender_id": 42,
                        "sender_username": "alice",
                        "timestamp": format!("t{counter}"),
                    });
                    ws.send(Message::Text(echo.to_string())).await.unwrap();
                    if body == "bye" {
                        ws.close(None).await.unwrap();
                        break;
                    }
                }
            }
        });
        format!("ws://{addr}/ws/chat/7/")
    }

    #[tokio::test]
    async fn send_is_rejected_until_open() {
        let address = echo_server().await;
        let (connection, mut events) = open(&address).unwrap();
        assert!(matches!(connection.send("early"), Err(ChatError::NotOpen)));

        assert!(matches!(next_event(&mut events).await, ConnectionEvent::Opened));
        assert_eq!(connection.state(), ChannelState::Open);
        connection.send("yo").unwrap();

        match next_event(&mut events).await {
            ConnectionEvent::Frame(frame) => {
                let envelope = codec::decode(&frame).unwrap();
                assert_eq!(envelope.body, "yo");
                assert_eq!(envelope.sender_id, Some(42));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_close_fires_closed_once_and_blocks_send() {
        let address = echo_server().await;
        let (connection, mut events) = open(&address).unwrap();
        assert!(matches!(next_event(&mut events).await, ConnectionEvent::Opened));

        connection.send("bye").unwrap();
        assert!(matches!(next_event(&mut events).await, ConnectionEvent::Frame(_)));
        match next_event(&mut events).await {
            ConnectionEvent::Closed(reason) => assert!(reason.is_unexpected()),
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(connection.state(), ChannelState::Closed);
        assert!(matches!(connection.send("x"), Err(ChatError::NotOpen)));
        // The driver is gone; nothing else arrives.
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn failed_handshake_closes_without_opening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (connection, mut events) = open(&format!("ws://{addr}/ws/chat/7/")).unwrap();
        match next_event(&mut events).await {
            ConnectionEvent::Closed(CloseReason::Failed(_)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(connection.state(), ChannelState::Closed);
        assert!(matches!(connection.send("x"), Err(ChatError::NotOpen)));
    }

    #[tokio::test]
    async fn local_close_reports_local_reason() {
        let address = echo_server().await;
        let (connection, mut events) = open(&address).unwrap();
        assert!(matches!(next_event(&mut events).await, ConnectionEvent::Opened));

        connection.close();
        match next_event(&mut events).await {
            ConnectionEvent::Closed(reason) => assert_eq!(reason, CloseReason::Local),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    /// Server nhận TCP nhưng không bao giờ trả lời handshake.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });
        format!("ws://{addr}/ws/chat/7/")
    }

    #[tokio::test]
    async fn close_while_connecting_fires_closed() {
        let address = silent_server().await;
        let (connection, mut events) = open(&address).unwrap();
        assert_eq!(connection.state(), ChannelState::Connecting);

        connection.close();
        match next_event(&mut events).await {
            ConnectionEvent::Closed(reason) => assert_eq!(reason, CloseReason::Local),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(connection.state(), ChannelState::Closed);
        assert!(matches!(connection.send("x"), Err(ChatError::NotOpen)));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_handle_while_connecting_ends_driver() {
        let address = silent_server().await;
        let (connection, mut events) = open(&address).unwrap();
        drop(connection);

        match next_event(&mut events).await {
            ConnectionEvent::Closed(reason) => assert_eq!(reason, CloseReason::Local),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.recv().await.is_none());
    }

    #[test]
    fn rejects_non_websocket_addresses() {
        assert!(matches!(
            open("http://127.0.0.1:8000/ws/chat/7/"),
            Err(ChatError::InvalidAddress(_))
        ));
        assert!(matches!(open("not a url"), Err(ChatError::InvalidAddress(_))));
    }
}
