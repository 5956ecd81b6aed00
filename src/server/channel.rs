use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use redis::aio::ConnectionManager;
use crate::common::models::{ChatMessage, MessageAuthor, StoredMessage};
use crate::server::config::ServerConfig;
use crate::server::database::Database;
use crate::server::messages;

/// First frame a client sends: which room it wants and its display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinMessage {
    pub message_type: String, // "join"
    pub room: String,
    pub name: String,
}

/// Reply to the join handshake. On success carries the thread history so the
/// client can seed its aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub message_type: String, // "join_response"
    pub success: bool,
    pub room: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub error: Option<String>,
}

/// Frame a joined client sends to broadcast into its room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSend {
    pub message_type: String, // "broadcast"
    pub content: String,
}

/// Envelope relayed over Redis so other server instances can fan out the
/// message to their own room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEnvelope {
    pub instance: String,
    pub room: String,
    pub message: ChatMessage,
}

pub type ClientId = String;

pub struct RoomConnection {
    pub client_id: ClientId,
    pub room: String,
    pub name: String,
    pub sender: tokio::sync::mpsc::UnboundedSender<Message>,
}

pub struct ChatChannelManager {
    // Unique per server instance, used to skip our own Redis echoes
    instance_id: String,
    connections: Arc<Mutex<HashMap<ClientId, RoomConnection>>>,
    rooms: Arc<Mutex<HashMap<String, HashSet<ClientId>>>>,
    redis_manager: Arc<Mutex<ConnectionManager>>,
    redis_url: String,
}

impl ChatChannelManager {
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis_manager = ConnectionManager::new(client).await?;

        Ok(Self {
            instance_id: Uuid::new_v4().to_string(),
            connections: Arc::new(Mutex::new(HashMap::new())),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            redis_manager: Arc::new(Mutex::new(redis_manager)),
            redis_url: redis_url.to_string(),
        })
    }

    /// Run the join handshake, then hand the connection over to the room.
    pub async fn handle_connection(
        &self,
        ws_stream: WebSocketStream<tokio::net::TcpStream>,
        db: Arc<Database>,
        config: ServerConfig,
    ) -> anyhow::Result<()> {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::debug!("[WS:JOIN] Waiting for join frame from client...");
        let join_timeout = tokio::time::timeout(
            tokio::time::Duration::from_secs(30),
            ws_receiver.next(),
        )
        .await;

        let join = match join_timeout {
            Ok(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<JoinMessage>(&text) {
                    Ok(join) if join.message_type == "join" && !join.room.trim().is_empty() => join,
                    Ok(_) => {
                        let reply = JoinResponse {
                            message_type: "join_response".to_string(),
                            success: false,
                            room: None,
                            history: vec![],
                            error: Some("Expected a 'join' frame with a room name".to_string()),
                        };
                        let _ = ws_sender.send(Message::Text(serde_json::to_string(&reply)?)).await;
                        return Err(anyhow::anyhow!("Invalid join frame"));
                    }
                    Err(e) => {
                        let reply = JoinResponse {
                            message_type: "join_response".to_string(),
                            success: false,
                            room: None,
                            history: vec![],
                            error: Some(format!("Invalid JSON: {}", e)),
                        };
                        let _ = ws_sender.send(Message::Text(serde_json::to_string(&reply)?)).await;
                        return Err(anyhow::anyhow!("Invalid JSON in join frame"));
                    }
                }
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                log::debug!("[WS:JOIN] Client closed connection during handshake");
                return Ok(());
            }
            Ok(Some(Ok(_))) => {
                return Err(anyhow::anyhow!("Expected text frame during handshake"));
            }
            Ok(Some(Err(e))) => {
                return Err(anyhow::anyhow!("WebSocket error during handshake: {}", e));
            }
            Err(_) => {
                let reply = JoinResponse {
                    message_type: "join_response".to_string(),
                    success: false,
                    room: None,
                    history: vec![],
                    error: Some("Handshake timeout".to_string()),
                };
                let _ = ws_sender.send(Message::Text(serde_json::to_string(&reply)?)).await;
                return Err(anyhow::anyhow!("Handshake timeout"));
            }
        };

        let room = join.room.trim().to_string();
        let name = if join.name.trim().is_empty() { "anonymous".to_string() } else { join.name.trim().to_string() };

        let history = messages::load_thread(db.clone(), &room).await.unwrap_or_default();
        let reply = JoinResponse {
            message_type: "join_response".to_string(),
            success: true,
            room: Some(room.clone()),
            history,
            error: None,
        };
        ws_sender.send(Message::Text(serde_json::to_string(&reply)?)).await?;
        log::info!("[WS:JOIN] '{}' joined room '{}'", name, room);

        let rebuilt_stream = ws_sender
            .reunite(ws_receiver)
            .map_err(|e| anyhow::anyhow!("Failed to reunite WebSocket stream: {}", e))?;

        self.add_connection(rebuilt_stream, room, name, db, config).await
    }

    async fn add_connection(
        &self,
        ws_stream: WebSocketStream<tokio::net::TcpStream>,
        room: String,
        name: String,
        db: Arc<Database>,
        config: ServerConfig,
    ) -> anyhow::Result<()> {
        let client_id = Uuid::new_v4().to_string();
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        {
            let mut connections = self.connections.lock().await;
            let mut rooms = self.rooms.lock().await;

            connections.insert(client_id.clone(), RoomConnection {
                client_id: client_id.clone(),
                room: room.clone(),
                name: name.clone(),
                sender: tx,
            });
            rooms.entry(room.clone()).or_default().insert(client_id.clone());
        }

        let connections = self.connections.clone();
        let rooms = self.rooms.clone();
        let redis_manager = self.redis_manager.clone();
        let instance_id = self.instance_id.clone();
        let client_id_clone = client_id.clone();
        let room_clone = room.clone();

        // Task that pushes frames to this client
        let send_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if ws_sender.send(message).await.is_err() {
                    break;
                }
            }
        });

        // Task that consumes frames from this client
        let receive_task = tokio::spawn(async move {
            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let send = match serde_json::from_str::<ClientSend>(&text) {
                            Ok(send) if send.message_type == "broadcast" => send,
                            Ok(_) => continue,
                            Err(e) => {
                                log::warn!("[WS:RECV] Unparseable frame from {}: {}", client_id_clone, e);
                                continue;
                            }
                        };

                        let content = send.content.trim().to_string();
                        if content.is_empty() {
                            continue;
                        }
                        if content.len() > config.max_message_length {
                            log::warn!("[WS:RECV] Dropping oversized message from {} ({} bytes)", client_id_clone, content.len());
                            continue;
                        }

                        let chat_message = ChatMessage {
                            id: Uuid::new_v4().to_string(),
                            content,
                            user: MessageAuthor { name: name.clone() },
                            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                        };

                        // Persist before fan-out so a crash never loses a delivered message
                        let stored = StoredMessage {
                            id: chat_message.id.clone(),
                            thread_id: room_clone.clone(),
                            author_id: chat_message.user.name.clone(),
                            content: chat_message.content.clone(),
                            created_at: chat_message.created_at.clone(),
                        };
                        if let Err(e) = messages::save_messages(db.clone(), &[stored]).await {
                            log::error!("[WS:DB] Failed to store message {}: {}", chat_message.id, e);
                            continue;
                        }

                        deliver_to_room(&connections, &rooms, &room_clone, &chat_message).await;

                        // Relay to other instances
                        let envelope = RoomEnvelope {
                            instance: instance_id.clone(),
                            room: room_clone.clone(),
                            message: chat_message,
                        };
                        let serialized = serde_json::to_string(&envelope).unwrap_or_default();
                        let mut redis_conn = redis_manager.lock().await;
                        let published: Result<(), _> = redis::cmd("PUBLISH")
                            .arg(format!("room:{}", room_clone))
                            .arg(&serialized)
                            .query_async(&mut *redis_conn)
                            .await;
                        if let Err(e) = published {
                            log::warn!("[WS:REDIS] Publish failed for room '{}': {}", room_clone, e);
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(_) => break,
                    _ => {}
                }
            }

            // Connection is gone, drop it from the registries
            {
                let mut connections = connections.lock().await;
                let mut rooms = rooms.lock().await;
                connections.remove(&client_id_clone);
                if let Some(members) = rooms.get_mut(&room_clone) {
                    members.remove(&client_id_clone);
                    if members.is_empty() {
                        rooms.remove(&room_clone);
                    }
                }
                log::info!("[WS:LEAVE] Client {} left room '{}'", client_id_clone, room_clone);
            }
        });

        tokio::select! {
            _ = send_task => {},
            _ = receive_task => {},
        }

        Ok(())
    }

    /// Background task mirroring broadcasts published by other server
    /// instances into our local rooms.
    pub async fn start_redis_subscriber(&self) -> anyhow::Result<()> {
        let connections = self.connections.clone();
        let rooms = self.rooms.clone();
        let instance_id = self.instance_id.clone();
        let redis_url = self.redis_url.clone();

        tokio::spawn(async move {
            log::info!("[WS:REDIS] Starting Redis pub/sub subscriber...");

            loop {
                match redis::Client::open(redis_url.as_str()) {
                    Ok(client) => match client.get_async_connection().await {
                        Ok(con) => {
                            let mut pubsub = con.into_pubsub();
                            if let Err(e) = pubsub.psubscribe("room:*").await {
                                log::warn!("[WS:REDIS] psubscribe failed: {}", e);
                            } else {
                                log::info!("[WS:REDIS] Subscribed to room:*");
                                let mut stream = pubsub.on_message();
                                while let Some(msg) = stream.next().await {
                                    let payload: String = match msg.get_payload() {
                                        Ok(p) => p,
                                        Err(_) => continue,
                                    };
                                    let envelope = match serde_json::from_str::<RoomEnvelope>(&payload) {
                                        Ok(env) => env,
                                        Err(_) => continue,
                                    };
                                    // Our own publishes already went out locally
                                    if envelope.instance == instance_id {
                                        continue;
                                    }
                                    deliver_to_room(&connections, &rooms, &envelope.room, &envelope.message).await;
                                }
                                log::warn!("[WS:REDIS] Redis stream ended");
                            }
                        }
                        Err(e) => {
                            log::warn!("[WS:REDIS] Failed to connect to Redis: {}", e);
                        }
                    },
                    Err(e) => {
                        log::warn!("[WS:REDIS] Failed to create Redis client: {}", e);
                    }
                }

                log::warn!("[WS:REDIS] Subscriber disconnected, retrying in 5 seconds...");
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            }
        });

        Ok(())
    }
}

/// Send a chat message to every member of a room, the sender included; the
/// client-side aggregator dedupes by id so echoes are harmless.
async fn deliver_to_room(
    connections: &Arc<Mutex<HashMap<ClientId, RoomConnection>>>,
    rooms: &Arc<Mutex<HashMap<String, HashSet<ClientId>>>>,
    room: &str,
    message: &ChatMessage,
) {
    let json_msg = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            log::error!("[WS:SEND] Failed to serialize message {}: {}", message.id, e);
            return;
        }
    };

    // Lock order everywhere is connections before rooms
    let connections_guard = connections.lock().await;
    let rooms_guard = rooms.lock().await;
    if let Some(members) = rooms_guard.get(room) {
        for client_id in members {
            if let Some(connection) = connections_guard.get(client_id) {
                let _ = connection.sender.send(Message::Text(json_msg.clone()));
            }
        }
    }
}
