//! Socket transports for the relay connection.
//!
//! A transport hands the client a pair of channels; the socket itself is driven by a task the
//! transport owns. Dropping the outbound sender closes the socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::*;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::messages::RelayMessage;
use super::RelayError;

pub struct RelayConnection {
    pub outbound: mpsc::UnboundedSender<RelayMessage>,
    pub inbound: mpsc::UnboundedReceiver<Result<RelayMessage, RelayError>>,
}

#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self) -> Result<RelayConnection, RelayError>;
}

/// JSON text frames over a WebSocket
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        WebSocketConnector { url }
    }
}

#[async_trait]
impl RelayConnector for WebSocketConnector {
    async fn connect(&self) -> Result<RelayConnection, RelayError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        info!("connected to relay at {}", self.url);
        let (mut write, mut read) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = outbound_rx.recv() => match msg {
                        Some(msg) => {
                            trace!("relay send {:?}", msg);
                            if let Err(e) = write.send(Message::Text(msg.to_json())).await {
                                let _ = inbound_tx.send(Err(RelayError::Transport(e.to_string())));
                                break;
                            }
                        }
                        None => {
                            debug!("closing relay socket");
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => match RelayMessage::from_json(&text) {
                            Ok(msg) =>
                                if inbound_tx.send(Ok(msg)).is_err() {
                                    break;
                                },
                            Err(e) => warn!("ignoring relay message {}: {}", text, e),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = inbound_tx
                                .send(Err(RelayError::Transport("closed by relay".to_string())));
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = inbound_tx.send(Err(RelayError::Transport(e.to_string())));
                            break;
                        }
                    },
                }
            }
        });
        Ok(RelayConnection { outbound, inbound })
    }
}

/// The relay side of an in-process connection
pub struct MemoryPeer {
    sender: mpsc::UnboundedSender<Result<RelayMessage, RelayError>>,
    receiver: mpsc::UnboundedReceiver<RelayMessage>,
}

impl MemoryPeer {
    pub fn send(&self, msg: RelayMessage) -> bool {
        self.sender.send(Ok(msg)).is_ok()
    }

    /// Next message from the client, `None` once the client closed the connection
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.receiver.recv().await
    }

    /// Drop the connection with a transport error
    pub fn fail(self, reason: &str) {
        let _ = self.sender.send(Err(RelayError::Transport(reason.to_string())));
    }
}

/// Connects to a relay living in the same process, every connection is handed to the receiver
/// returned by [`MemoryConnector::new`]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        (MemoryConnector { peers }, peers_rx)
    }
}

#[async_trait]
impl RelayConnector for MemoryConnector {
    async fn connect(&self) -> Result<RelayConnection, RelayError> {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let (sender, inbound) = mpsc::unbounded_channel();
        self.peers
            .send(MemoryPeer { sender, receiver })
            .map_err(|_| RelayError::Transport("relay unavailable".to_string()))?;
        Ok(RelayConnection { outbound, inbound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_connector_test() {
        let (connector, mut peers) = MemoryConnector::new();
        let mut conn = connector.connect().await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        assert!(peer.send(RelayMessage::UnauthorizedConnection));
        assert_eq!(conn.inbound.recv().await.unwrap(), Ok(RelayMessage::UnauthorizedConnection));

        conn.outbound.send(RelayMessage::ConnectRequest { identity: "02ab".to_string() }).unwrap();
        assert_eq!(
            peer.recv().await,
            Some(RelayMessage::ConnectRequest { identity: "02ab".to_string() })
        );
        drop(conn.outbound);
        assert_eq!(peer.recv().await, None);

        peer.fail("boom");
        assert_eq!(
            conn.inbound.recv().await.unwrap(),
            Err(RelayError::Transport("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn memory_connector_closed_test() {
        let (connector, peers) = MemoryConnector::new();
        drop(peers);
        assert!(matches!(connector.connect().await, Err(RelayError::Transport(_))));
    }
}
