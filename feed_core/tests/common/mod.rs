//! Loopback exchange used by the integration tests.
//!
//! Every accepted WebSocket connection becomes a `Peer` the test drives by hand: it
//! can push raw frames to the client and inspect what the client sent. In echo mode
//! the exchange reflects text frames back like the real simulated exchange.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use feed_common::{Catalog, Instrument};
use feed_core::CatalogRepository;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};

pub const WAIT: Duration = Duration::from_secs(5);

/// What a peer observed from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    Text(String),
    Closed(Option<u16>),
}

/// Server side of one client connection.
pub struct Peer {
    outbound: mpsc::UnboundedSender<Message>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
}

impl Peer {
    pub fn send_text(&self, text: impl Into<String>) {
        self.outbound.send(Message::Text(text.into())).unwrap();
    }

    pub fn send_binary(&self, bytes: Vec<u8>) {
        self.outbound.send(Message::Binary(bytes)).unwrap();
    }

    /// Text frame carrying `bytes` as is, valid UTF-8 or not.
    pub fn send_raw_text(&self, bytes: Vec<u8>) {
        let frame = Frame::message(bytes, OpCode::Data(Data::Text), true);
        self.outbound.send(Message::Frame(frame)).unwrap();
    }

    pub fn send_instrument(&self, ticker: &str, name: &str, price: &str, change: &str) {
        self.send_text(format!(
            r#"{{"ticker":"{}","name":"{}","price":{},"priceChange":"{}"}}"#,
            ticker, name, price, change
        ));
    }

    pub fn close(&self) {
        self.outbound.send(Message::Close(None)).unwrap();
    }

    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        tokio::time::timeout(WAIT, self.events.recv()).await.ok().flatten()
    }

    /// Skips text frames until the client's close frame arrives.
    pub async fn close_code(&mut self) -> Option<u16> {
        while let Some(event) = self.next_event().await {
            if let PeerEvent::Closed(code) = event {
                return code;
            }
        }
        None
    }
}

pub struct ScriptedExchange {
    url: String,
    peers: mpsc::UnboundedReceiver<Peer>,
}

impl ScriptedExchange {
    pub async fn start() -> Self {
        Self::bind(false).await
    }

    pub async fn echo() -> Self {
        Self::bind(true).await
    }

    async fn bind(echo: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (peers_tx, peers) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(socket) = accept_async(stream).await else {
                    continue;
                };
                let (mut sink, mut source) = socket.split();
                let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
                let (events_tx, events) = mpsc::unbounded_channel();

                tokio::spawn(async move {
                    while let Some(message) = outbound_rx.recv().await {
                        if sink.send(message).await.is_err() {
                            break;
                        }
                    }
                });

                let echo_tx = outbound.clone();
                tokio::spawn(async move {
                    while let Some(Ok(message)) = source.next().await {
                        match message {
                            Message::Text(text) => {
                                if echo {
                                    let _ = echo_tx.send(Message::Text(text.clone()));
                                }
                                let _ = events_tx.send(PeerEvent::Text(text));
                            }
                            Message::Close(frame) => {
                                let _ = events_tx
                                    .send(PeerEvent::Closed(frame.map(|f| u16::from(f.code))));
                                break;
                            }
                            _ => {}
                        }
                    }
                });

                if peers_tx.send(Peer { outbound, events }).is_err() {
                    break;
                }
            }
        });

        ScriptedExchange { url, peers }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn next_peer(&mut self) -> Peer {
        tokio::time::timeout(WAIT, self.peers.recv())
            .await
            .expect("no client connected")
            .expect("exchange stopped")
    }

    /// Whether a client connected that has not been handed out yet.
    pub fn has_pending_peer(&mut self) -> bool {
        self.peers.try_recv().is_ok()
    }
}

/// Catalog repository with `seed` (ticker, name, whole price) pointing at `url`.
pub fn repository(url: &str, seed: &[(&str, &str, i64)]) -> Arc<CatalogRepository> {
    let instruments = seed
        .iter()
        .map(|(ticker, name, price)| {
            Instrument::new(*ticker, *name, Decimal::from(*price))
                .with_description(Some(format!("{} description", ticker)))
        })
        .collect();
    Arc::new(CatalogRepository::new(Catalog::from_instruments(instruments), url))
}
