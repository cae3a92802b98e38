use feed_common::{FeedError, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// WebSocket endpoint that reflects every data frame back to its sender.
///
/// Each accepted connection is upgraded and served by its own task, so a broken or
/// misbehaving client never affects the others.
pub struct EchoServer {
    /// The underlying TCP listening socket.
    pub(crate) listener: TcpListener,
}

impl EchoServer {
    /// Bind a new echo server to the provided `bind_addr` (e.g., `127.0.0.1:8090`).
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { listener })
    }

    /// Address the server actually listens on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, spawning one echo task per client.
    pub async fn serve(self) -> Result<()> {
        info!("Echo exchange is started on ws://{}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer).await {
                            warn!("Connection {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
    }
}

/// Upgrades `stream` and echoes text and binary frames until the client leaves.
pub(crate) async fn handle_connection(stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let mut socket = accept_async(stream)
        .await
        .map_err(|e| FeedError::WebSocket(format!("handshake with {} failed: {}", peer, e)))?;
    info!("Client connected: {}", peer);

    let mut echoed = 0usize;
    while let Some(frame) = socket.next().await {
        let frame = frame.map_err(|e| FeedError::WebSocket(e.to_string()))?;
        match frame {
            Message::Text(_) | Message::Binary(_) => {
                debug!("Echo to {}: {:?}", peer, frame);
                socket
                    .send(frame)
                    .await
                    .map_err(|e| FeedError::WebSocket(e.to_string()))?;
                echoed += 1;
            }
            Message::Close(frame) => {
                info!(
                    "Client {} closed the connection (code {:?}) after {} frames",
                    peer,
                    frame.map(|f| u16::from(f.code)),
                    echoed
                );
                // Flushes the close reply queued by tungstenite.
                let _ = socket.close(None).await;
                return Ok(());
            }
            // Pings are answered by tungstenite itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    info!("Client {} disconnected after {} frames", peer, echoed);
    Ok(())
}
