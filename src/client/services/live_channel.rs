use crate::client::models::conversation::Broadcast;
use crate::common::models::ChatMessage;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinMessage {
    pub message_type: String, // "join"
    pub room: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub message_type: String, // "join_response"
    pub success: bool,
    pub room: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSend {
    pub message_type: String, // "broadcast"
    pub content: String,
}

#[derive(Debug, Clone)]
pub enum LiveChannelError {
    ConnectionFailed(String),
    JoinFailed(String),
    Disconnected,
    InvalidMessage(String),
    Timeout,
}

impl std::fmt::Display for LiveChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveChannelError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            LiveChannelError::JoinFailed(msg) => write!(f, "Join failed: {}", msg),
            LiveChannelError::Disconnected => write!(f, "Live channel disconnected"),
            LiveChannelError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            LiveChannelError::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for LiveChannelError {}

/// Client end of the realtime conversation channel. Connects, joins a room,
/// then exposes the stream of incoming messages and a broadcast sender. The
/// send gate observes `is_connected()`.
pub struct LiveChannel {
    url: String,
    room: String,
    user_name: String,
    max_retry_attempts: u32,
    retry_delay: tokio::time::Duration,
    /// Incoming messages for the application
    message_sender: mpsc::UnboundedSender<ChatMessage>,
    message_receiver: Option<mpsc::UnboundedReceiver<ChatMessage>>,
    /// Outgoing broadcast contents, None until the join handshake succeeds
    outgoing_sender: Option<mpsc::UnboundedSender<String>>,
    /// Thread history returned by the join handshake, used to seed the
    /// aggregator
    history: Vec<ChatMessage>,
}

impl LiveChannel {
    pub fn new(url: String, room: String, user_name: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            url,
            room,
            user_name,
            max_retry_attempts: 5,
            retry_delay: tokio::time::Duration::from_secs(2),
            message_sender: tx,
            message_receiver: Some(rx),
            outgoing_sender: None,
            history: Vec::new(),
        }
    }

    /// The application's receiving end; can be taken only once.
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ChatMessage>> {
        self.message_receiver.take()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_connected(&self) -> bool {
        self.outgoing_sender.is_some()
    }

    /// Connect and join the room, retrying on transport failures.
    pub async fn connect(&mut self) -> Result<(), LiveChannelError> {
        for attempt in 1..=self.max_retry_attempts {
            match self.try_connect().await {
                Ok(()) => {
                    log::info!("[CHANNEL] Joined room '{}' as '{}'", self.room, self.user_name);
                    return Ok(());
                }
                Err(LiveChannelError::JoinFailed(msg)) => {
                    // The server rejected the join; retrying will not help
                    return Err(LiveChannelError::JoinFailed(msg));
                }
                Err(e) => {
                    log::warn!(
                        "[CHANNEL] Connect attempt {}/{} failed: {}",
                        attempt,
                        self.max_retry_attempts,
                        e
                    );
                    if attempt < self.max_retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(LiveChannelError::ConnectionFailed(format!(
            "gave up after {} attempts",
            self.max_retry_attempts
        )))
    }

    async fn try_connect(&mut self) -> Result<(), LiveChannelError> {
        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| LiveChannelError::ConnectionFailed(e.to_string()))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let join = JoinMessage {
            message_type: "join".to_string(),
            room: self.room.clone(),
            name: self.user_name.clone(),
        };
        let frame = serde_json::to_string(&join)
            .map_err(|e| LiveChannelError::InvalidMessage(e.to_string()))?;
        ws_sender
            .send(Message::Text(frame))
            .await
            .map_err(|e| LiveChannelError::ConnectionFailed(e.to_string()))?;

        // Wait for the join response
        let reply = tokio::time::timeout(tokio::time::Duration::from_secs(10), ws_receiver.next())
            .await
            .map_err(|_| LiveChannelError::Timeout)?;

        let response = match reply {
            Some(Ok(Message::Text(text))) => serde_json::from_str::<JoinResponse>(&text)
                .map_err(|e| LiveChannelError::InvalidMessage(e.to_string()))?,
            Some(Ok(_)) => {
                return Err(LiveChannelError::InvalidMessage(
                    "expected a text join response".to_string(),
                ))
            }
            Some(Err(e)) => return Err(LiveChannelError::ConnectionFailed(e.to_string())),
            None => return Err(LiveChannelError::Disconnected),
        };

        if !response.success {
            return Err(LiveChannelError::JoinFailed(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        self.history = response.history;

        // Writer task: forward broadcast contents as channel frames
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(content) = outgoing_rx.recv().await {
                let frame = ClientSend { message_type: "broadcast".to_string(), content };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(_) => continue,
                };
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        // Reader task: forward room broadcasts to the application
        let message_sender = self.message_sender.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ChatMessage>(&text) {
                            Ok(message) => {
                                if message_sender.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                log::debug!("[CHANNEL] Ignoring unparseable frame: {}", e);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(_) => break,
                    _ => {}
                }
            }
            log::info!("[CHANNEL] Live channel closed");
        });

        self.outgoing_sender = Some(outgoing_tx);
        Ok(())
    }
}

impl Broadcast for LiveChannel {
    fn broadcast(&mut self, content: &str) {
        if let Some(sender) = &self.outgoing_sender {
            if sender.send(content.to_string()).is_err() {
                // Writer task is gone, the connection is dead
                self.outgoing_sender = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_with_empty_history() {
        let channel = LiveChannel::new(
            "ws://127.0.0.1:5001".into(),
            "thread-1".into(),
            "ama".into(),
        );
        assert!(!channel.is_connected());
        assert!(channel.history().is_empty());
    }

    #[test]
    fn receiver_can_only_be_taken_once() {
        let mut channel = LiveChannel::new(
            "ws://127.0.0.1:5001".into(),
            "thread-1".into(),
            "ama".into(),
        );
        assert!(channel.take_receiver().is_some());
        assert!(channel.take_receiver().is_none());
    }

    #[test]
    fn broadcast_while_disconnected_is_a_no_op() {
        let mut channel = LiveChannel::new(
            "ws://127.0.0.1:5001".into(),
            "thread-1".into(),
            "ama".into(),
        );
        // Must not panic or queue anything
        channel.broadcast("hello");
        assert!(!channel.is_connected());
    }
}
