//! WebSocket Game Server
//!
//! Async WebSocket server for room-based matches. Each connection runs in
//! its own task with a dedicated writer task, so everything sent to one
//! client goes out in order.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::game::state::MatchConfig;
use crate::network::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::network::session::{ConnectionId, RoomConfig, RoomManager, SeedPolicy, SessionError};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close connections silent for this long. `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
    /// Outbound queue depth per connection.
    pub channel_capacity: usize,
    /// Applied to every new room.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address is valid"),
            max_connections: 1000,
            idle_timeout: None,
            channel_capacity: 64,
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ARCANE_SIEGE_*` environment variables.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GameServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, GameServerError> {
            value
                .trim()
                .parse()
                .map_err(|_| GameServerError::Config(format!("invalid {key}: {value:?}")))
        }

        let mut config = Self::default();

        if let Some(v) = lookup("ARCANE_SIEGE_BIND") {
            config.bind_addr = parse("ARCANE_SIEGE_BIND", &v)?;
        }
        if let Some(v) = lookup("ARCANE_SIEGE_MAX_CONNECTIONS") {
            config.max_connections = parse("ARCANE_SIEGE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("ARCANE_SIEGE_IDLE_TIMEOUT_SECS") {
            let secs: u64 = parse("ARCANE_SIEGE_IDLE_TIMEOUT_SECS", &v)?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = lookup("ARCANE_SIEGE_SEED") {
            config.room.seed = SeedPolicy::Fixed(parse("ARCANE_SIEGE_SEED", &v)?);
        }
        if let Some(v) = lookup("ARCANE_SIEGE_CASTERS") {
            config.room.match_config = MatchConfig {
                casters_per_team: parse("ARCANE_SIEGE_CASTERS", &v)?,
                ..config.room.match_config
            }
            .normalized();
        }

        Ok(config)
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Bad configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Connected client bookkeeping.
struct ConnectedClient {
    /// Remote address.
    addr: SocketAddr,
    /// Connection time.
    connected_at: DateTime<Utc>,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Room manager.
    rooms: Arc<RoomManager>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let rooms = Arc::new(RoomManager::new(config.room.clone()));

        Self {
            config,
            rooms,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let rooms = self.rooms.clone();
        let idle_timeout = self.config.idle_timeout;
        let capacity = self.config.channel_capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let connection: ConnectionId = Uuid::new_v4();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(capacity);

            clients.write().await.insert(connection, ConnectedClient {
                addr,
                connected_at: Utc::now(),
            });
            info!(%connection, %addr, "client connected");

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let mut deadline = idle_timeout.map(|d| Instant::now() + d);

            loop {
                let idle = async move {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    msg = ws_receiver.next() => {
                        deadline = idle_timeout.map(|d| Instant::now() + d);
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(connection, client_msg, &rooms, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!(%connection, "Dropping frame: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!(%connection, "Dropping frame: {}", ProtocolError::BinaryFrame);
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%connection, "Client disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                error!(%connection, "WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = idle => {
                        info!(%connection, "Closing idle connection");
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            rooms.leave(&connection).await;
            drop(msg_tx);
            sender_task.abort();

            if let Some(client) = clients.write().await.remove(&connection) {
                let duration = Utc::now() - client.connected_at;
                info!(
                    %connection,
                    addr = %client.addr,
                    seconds = duration.num_seconds(),
                    "client cleaned up"
                );
            }
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        connection: ConnectionId,
        msg: ClientMessage,
        rooms: &RoomManager,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Join { room_id } => {
                if let Err(e) = rooms.join(connection, &room_id, sender.clone()).await {
                    warn!(%connection, room = %room_id, "Join refused: {}", e);
                    let _ = sender.send(ServerMessage::error(e)).await;
                }
            }
            ClientMessage::Action(envelope) => {
                if let Err(e) = rooms.act(&connection, envelope.request()).await {
                    debug!(%connection, "Action refused: {}", e);
                    let _ = sender.send(ServerMessage::error(e)).await;
                }
            }
            ClientMessage::Ping => {
                let _ = sender.send(ServerMessage::Pong).await;
            }
        }
    }

    /// Shared room manager.
    pub fn rooms(&self) -> Arc<RoomManager> {
        self.rooms.clone()
    }

    /// Signal the server and all connection tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get live room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.room_count().await
    }
}
