//! WebSocket connection to a room server.
//!
//! [`connect`] opens the socket, joins a room and hands back a
//! [`ServerLink`]: a pair of channels backed by a reader task and a
//! writer task.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::protocol::{ClientMessage, ServerMessage};

/// Channel depth in each direction.
const LINK_CAPACITY: usize = 64;

/// Client-side connection errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open the WebSocket.
    #[error("Failed to connect: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The link's tasks have stopped.
    #[error("Connection closed")]
    Closed,
}

/// Live connection to the server.
pub struct ServerLink {
    /// Messages to send.
    pub outgoing: mpsc::Sender<ClientMessage>,
    /// Messages received, in arrival order.
    pub incoming: mpsc::Receiver<ServerMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ServerLink {
    /// Queue a message for the server.
    pub async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(message).await.map_err(|_| ClientError::Closed)
    }

    /// Next message from the server, `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    /// Stop both tasks, closing the socket.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ServerLink {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connect to `url` and join `room_id`.
///
/// The `join` is queued before this returns, so the first message on
/// `incoming` is the server's answer to it.
pub async fn connect(url: &str, room_id: &str) -> Result<ServerLink, ClientError> {
    info!("Connecting to {}...", url);
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ClientMessage>(LINK_CAPACITY);
    let (incoming_tx, incoming_rx) = mpsc::channel::<ServerMessage>(LINK_CAPACITY);

    let reader = tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                    Ok(server_msg) => {
                        if incoming_tx.send(server_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse server message: {} - {}", e, text);
                    }
                },
                Ok(Message::Close(_)) => {
                    info!("Server closed connection");
                    break;
                }
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        debug!("Reader task ended");
    });

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to encode message: {}", e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json)).await {
                error!("Failed to send message: {}", e);
                break;
            }
        }
        let _ = write.close().await;
        debug!("Writer task ended");
    });

    let link = ServerLink {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
        reader,
        writer,
    };
    link.send(ClientMessage::Join { room_id: room_id.to_string() }).await?;
    Ok(link)
}
