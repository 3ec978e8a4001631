//! Relay server chạy cục bộ để phát triển và kiểm thử client.
//!
//! Each socket joins the room shared by its two participants, receives the
//! room's recent history, then gets every newly stamped message of the room,
//! its own included.

use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use regex::Regex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::Uri;

use crate::common::{MessageEnvelope, SentAt};
use crate::sync::codec;

const HISTORY_LIMIT: usize = 25;
const ROOM_CAPACITY: usize = 100;

/// Khoá phòng không phụ thuộc thứ tự hai người tham gia.
pub fn room_key(first: i64, second: i64) -> String {
    format!("chat_{}_{}", first.min(second), first.max(second))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Caller {
    user_id: i64,
    username: String,
    peer_id: i64,
}

struct Room {
    sender: broadcast::Sender<String>,
    history: VecDeque<String>,
    last_micros: i64,
}

impl Room {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(ROOM_CAPACITY);
        Self {
            sender,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            last_micros: i64::MIN,
        }
    }

    /// Timestamp token, strictly increasing within the room.
    fn next_token(&mut self, now: DateTime<Utc>) -> SentAt {
        let micros = now.timestamp_micros().max(self.last_micros.saturating_add(1));
        self.last_micros = micros;
        let token = DateTime::from_timestamp_micros(micros)
            .map(|stamp| stamp.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_else(|| micros.to_string());
        SentAt(token)
    }

    fn remember(&mut self, frame: String) {
        self.history.push_back(frame);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

#[derive(Clone)]
pub struct Relay {
    rooms: Arc<Mutex<HashMap<String, Room>>>,
    route: Arc<Regex>,
}

impl Relay {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            route: Arc::new(Regex::new(r"^/ws/chat/(\d+)/?$")?),
        })
    }

    fn parse_caller(&self, uri: &Uri) -> Option<Caller> {
        let captures = self.route.captures(uri.path())?;
        let peer_id = captures.get(1)?.as_str().parse().ok()?;

        let mut user_id = None;
        let mut username = None;
        for (key, value) in url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "user_id" => user_id = value.parse().ok(),
                "username" if !value.trim().is_empty() => username = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Caller {
            user_id: user_id?,
            username: username?,
            peer_id,
        })
    }

    /// Rooms are never evicted: the history of a conversation outlives its
    /// sockets so a later reconnect still gets the replay.
    async fn join(&self, key: &str) -> (broadcast::Receiver<String>, Vec<String>) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(key.to_string()).or_insert_with(Room::new);
        (room.sender.subscribe(), room.history.iter().cloned().collect())
    }

    async fn publish(&self, key: &str, caller: &Caller, frame: &[u8]) {
        let body = match codec::decode_outbound(frame) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("Ignoring frame from user {}: {err}", caller.user_id);
                return;
            }
        };

        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(key) else {
            return;
        };
        let envelope = MessageEnvelope {
            body,
            sender_id: Some(caller.user_id),
            sender_display_name: Some(caller.username.clone()),
            sent_at: Some(room.next_token(Utc::now())),
        };
        match codec::encode_envelope(&envelope) {
            Ok(frame) => {
                room.remember(frame.clone());
                let _ = room.sender.send(frame);
            }
            Err(err) => log::warn!("Failed to encode envelope: {err}"),
        }
    }

    async fn handle(&self, stream: TcpStream) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut uri = None;
        let mut ws = accept_hdr_async(
            stream,
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                uri = Some(request.uri().clone());
                Ok(response)
            },
        )
        .await?;

        let Some(caller) = uri.as_ref().and_then(|uri| self.parse_caller(uri)) else {
            log::warn!("Rejecting socket without a valid chat route or identity: {uri:?}");
            ws.close(None).await?;
            return Ok(());
        };

        let key = room_key(caller.user_id, caller.peer_id);
        let (mut receiver, backlog) = self.join(&key).await;
        log::info!(
            "User {} ({}) joined {key}, replaying {} messages",
            caller.user_id,
            caller.username,
            backlog.len()
        );

        let (mut write, mut read) = ws.split();
        for frame in backlog {
            write.send(Message::Text(frame)).await?;
        }

        loop {
            tokio::select! {
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.publish(&key, &caller, text.as_bytes()).await,
                    Some(Ok(Message::Binary(data))) => self.publish(&key, &caller, &data).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::debug!("Socket of user {} failed: {err}", caller.user_id);
                        break;
                    }
                },
                outbound = receiver.recv() => match outbound {
                    Ok(frame) => write.send(Message::Text(frame)).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("User {} lagged behind {key}, skipped {skipped} messages", caller.user_id);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        log::info!("User {} left {key}", caller.user_id);
        Ok(())
    }
}

pub async fn run(bind: &str) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(bind).await?;
    log::info!("Relay listening on ws://{}", listener.local_addr()?);
    serve(listener, Relay::new()?).await
}

pub async fn serve(listener: TcpListener, relay: Relay) -> Result<(), Box<dyn Error>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let relay = relay.clone();
        tokio::spawn(async move {
            if let Err(err) = relay.handle(stream).await {
                log::warn!("Connection from {peer_addr} ended with error: {err}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::common::ChannelState;
    use crate::sync::view::Delivery;
    use crate::sync::{ChatSession, Side, SubmitOutcome};

    async fn spawn_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let relay = Relay::new().unwrap();
        tokio::spawn(async move {
            let _ = serve(listener, relay).await;
        });
        format!("ws://{addr}")
    }

    fn address(base: &str, user_id: i64, username: &str, peer_id: i64) -> String {
        format!("{base}/ws/chat/{peer_id}/?user_id={user_id}&username={username}")
    }

    async fn wait_open(session: &mut ChatSession) {
        timeout(Duration::from_secs(5), async {
            while session.view().channel_state() == ChannelState::Connecting {
                session.next_event().await.expect("connection ended early");
            }
        })
        .await
        .expect("timed out waiting for handshake");
        assert_eq!(session.view().channel_state(), ChannelState::Open);
    }

    async fn wait_entries(session: &mut ChatSession, count: usize) {
        timeout(Duration::from_secs(5), async {
            while session.view().transcript().len() < count {
                session.next_event().await.expect("connection ended early");
            }
        })
        .await
        .expect("timed out waiting for messages");
    }

    #[test]
    fn room_key_ignores_participant_order() {
        assert_eq!(room_key(42, 7), "chat_7_42");
        assert_eq!(room_key(7, 42), "chat_7_42");
    }

    #[test]
    fn caller_comes_from_route_and_query() {
        let relay = Relay::new().unwrap();
        let uri: Uri = "/ws/chat/7/?user_id=42&username=alice%20b".parse().unwrap();
        assert_eq!(
            relay.parse_caller(&uri),
            Some(Caller {
                user_id: 42,
                username: "alice b".to_string(),
                peer_id: 7,
            })
        );

        for bad in [
            "/ws/chat/7/?username=alice",
            "/ws/chat/7/?user_id=42",
            "/ws/chat/bob/?user_id=42&username=alice",
            "/other/7/?user_id=42&username=alice",
        ] {
            let uri: Uri = bad.parse().unwrap();
            assert_eq!(relay.parse_caller(&uri), None, "{bad}");
        }
    }

    #[test]
    fn tokens_increase_within_a_room() {
        let mut room = Room::new();
        let now = Utc::now();
        let first = room.next_token(now);
        let second = room.next_token(now);
        assert_ne!(first, second);
        assert!(second.0 > first.0);
    }

    #[tokio::test]
    async fn message_is_rendered_only_after_echo() {
        let base = spawn_relay().await;
        let mut alice = ChatSession::open(42, 7, &address(&base, 42, "alice", 7)).unwrap();
        let mut bob = ChatSession::open(7, 42, &address(&base, 7, "bob", 42)).unwrap();
        wait_open(&mut alice).await;
        wait_open(&mut bob).await;

        alice.compose_mut().set_input("yo");
        assert_eq!(alice.submit(), SubmitOutcome::Enqueued);
        assert_eq!(alice.compose().input(), "");
        assert!(alice.view().transcript().is_empty());

        wait_entries(&mut alice, 1).await;
        wait_entries(&mut bob, 1).await;

        let own = &alice.view().transcript().entries()[0];
        assert_eq!(own.side, Side::Own);
        assert_eq!(own.to_string(), "alice: yo");

        let theirs = &bob.view().transcript().entries()[0];
        assert_eq!(theirs.side, Side::Other);
        assert_eq!(theirs.to_string(), "alice: yo");
        assert_eq!(own.sent_at, theirs.sent_at);
    }

    #[tokio::test]
    async fn reconnect_replays_history_once_in_order() {
        let base = spawn_relay().await;
        let mut alice = ChatSession::open(42, 7, &address(&base, 42, "alice", 7)).unwrap();
        wait_open(&mut alice).await;
        for body in ["one", "two", "three"] {
            alice.compose_mut().set_input(body);
            assert_eq!(alice.submit(), SubmitOutcome::Enqueued);
        }
        wait_entries(&mut alice, 3).await;
        alice.close();

        let mut bob = ChatSession::open(7, 42, &address(&base, 7, "bob", 42)).unwrap();
        wait_open(&mut bob).await;
        wait_entries(&mut bob, 3).await;

        let bodies: Vec<_> = bob
            .view()
            .transcript()
            .entries()
            .iter()
            .map(|entry| entry.body.clone())
            .collect();
        assert_eq!(bodies, ["one", "two", "three"]);

        // The same replayed frame arriving again is absorbed by the ledger.
        let replayed = alice.view().transcript().entries()[0].sent_at.clone().unwrap();
        let frame = format!(
            r#"{{"message":"one","sender_id":42,"sender_username":"alice","timestamp":"{replayed}"}}"#
        );
        assert_eq!(
            bob.view_mut().deliver(frame.as_bytes()),
            Delivery::DuplicateSuppressed
        );
        assert_eq!(bob.view().transcript().len(), 3);
    }

    #[tokio::test]
    async fn socket_without_identity_is_closed() {
        let base = spawn_relay().await;
        let mut stranger = ChatSession::open(42, 7, &format!("{base}/ws/chat/7/")).unwrap();
        timeout(Duration::from_secs(5), async {
            while stranger.next_event().await.is_some() {}
        })
        .await
        .expect("relay kept the socket open");

        assert_eq!(stranger.view().channel_state(), ChannelState::Closed);
        stranger.compose_mut().set_input("x");
        assert!(matches!(stranger.submit(), SubmitOutcome::Rejected(_)));
        assert_eq!(stranger.compose().input(), "x");
    }
}
