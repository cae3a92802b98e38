//! Generic typed duplex channel over a WebSocket.
//!
//! A `DuplexChannel<In, Out>` represents exactly one connection attempt. Outbound
//! values are encoded to JSON text frames, inbound text frames are decoded into `In`
//! values and exposed as a lazy stream. The lifecycle is monotonic:
//!
//! ```text
//! idle -> connecting -> open -> terminated(reason)
//! ```
//!
//! Once terminated a channel never reopens; build a new one for another attempt.
//!
//! Internals:
//! - `open()` returns immediately and spawns a connection task that connects, starts a
//!   writer task and then runs the receive loop.
//! - The writer task owns the socket sink. Sends are queued to it together with a
//!   oneshot that reports the outcome of the actual write, so `send` still fails with
//!   the real transport error.
//! - The receive loop delivers every decoded message and at most one terminal error.
//!   A malformed frame is fatal: the channel terminates with `Decode`/`InvalidPayload`.
//! - Termination closes the socket with a close code derived from the terminal error,
//!   see [`close_code`]. It only cancels the receive loop: a connection task that is
//!   still handshaking finishes the handshake and then flushes the close frame, so the
//!   peer always sees a proper closure.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use feed_common::ChannelError;
use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Lifecycle state of a channel.
#[derive(Debug, Clone)]
pub enum ChannelState {
    /// Created, `open()` not called yet.
    Idle,
    /// `open()` called, connection not established yet. Sends are queued.
    Connecting,
    /// Connected and receiving.
    Open,
    /// Finished for good; `None` means a clean stop.
    Terminated(Option<ChannelError>),
}

impl ChannelState {
    /// Whether the channel reached its final state.
    pub fn is_terminated(&self) -> bool {
        matches!(self, ChannelState::Terminated(_))
    }
}

/// Close code sent to the peer when the channel terminates for `reason`.
///
/// Peers inspect these codes, so the mapping is part of the protocol:
/// clean stop → 1000, payload failures → 1007, everything else → 1006.
pub fn close_code(reason: Option<&ChannelError>) -> CloseCode {
    match reason {
        None => CloseCode::Normal,
        Some(err) if err.is_payload_error() => CloseCode::Invalid,
        Some(_) => CloseCode::Abnormal,
    }
}

type Inbound<In> = Result<In, ChannelError>;

enum Outbound {
    Frame(Message, oneshot::Sender<Result<(), ChannelError>>),
    Close(CloseFrame<'static>),
}

/// State reachable from both the channel handle and its background tasks.
struct Shared<In> {
    endpoint: String,
    state: Mutex<ChannelState>,
    inbound: Mutex<Option<mpsc::UnboundedSender<Inbound<In>>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    stopped: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<In> Shared<In> {
    fn state(&self) -> ChannelState {
        lock(&self.state).clone()
    }

    fn mark_open(&self) {
        let mut state = lock(&self.state);
        if matches!(*state, ChannelState::Connecting) {
            *state = ChannelState::Open;
        }
    }

    fn deliver(&self, message: In) {
        if let Some(inbound) = lock(&self.inbound).as_ref() {
            // Nobody listening is fine; the message is dropped.
            let _ = inbound.send(Ok(message));
        }
    }

    /// Moves the channel to `Terminated(reason)`. Returns `false` if it already was.
    fn finish(&self, reason: Option<ChannelError>) -> bool {
        {
            let mut state = lock(&self.state);
            if state.is_terminated() {
                return false;
            }
            *state = ChannelState::Terminated(reason.clone());
        }

        let code = close_code(reason.as_ref());
        match &reason {
            None => info!("Channel to {} closed ({})", self.endpoint, u16::from(code)),
            Some(err) => warn!(
                "Channel to {} terminated ({}): {}",
                self.endpoint,
                u16::from(code),
                err
            ),
        }

        if let Some(inbound) = lock(&self.inbound).take() {
            if let Some(err) = reason {
                let _ = inbound.send(Err(err));
            }
        }
        let _ = self.outbound.send(Outbound::Close(CloseFrame {
            code,
            reason: "".into(),
        }));
        self.stopped.send_replace(true);
        true
    }
}

/// Bidirectional typed message channel over one WebSocket connection attempt.
pub struct DuplexChannel<In, Out> {
    shared: Arc<Shared<In>>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Inbound<In>>>>,
    _out: PhantomData<fn(Out)>,
}

impl<In, Out> DuplexChannel<In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize,
{
    /// Creates an idle channel for `endpoint` (a `ws://` or `wss://` URL). Nothing is
    /// connected until [`open`](Self::open).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        DuplexChannel {
            shared: Arc::new(Shared {
                endpoint: endpoint.into(),
                state: Mutex::new(ChannelState::Idle),
                inbound: Mutex::new(Some(inbound_tx)),
                outbound: outbound_tx,
                stopped: watch::channel(false).0,
            }),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            _out: PhantomData,
        }
    }

    /// Starts connecting in the background and returns without waiting for the
    /// handshake. Connection failures arrive through
    /// [`received_messages`](Self::received_messages) as a terminal `Transport` error.
    ///
    /// Must be called from within a Tokio runtime. Calling it on a channel that is
    /// already connecting or open has no effect.
    pub fn open(&self) -> Result<(), ChannelError> {
        {
            let mut state = lock(&self.shared.state);
            match *state {
                ChannelState::Terminated(_) => return Err(ChannelError::AlreadyTerminated),
                ChannelState::Connecting | ChannelState::Open => return Ok(()),
                ChannelState::Idle => *state = ChannelState::Connecting,
            }
        }

        let Some(outbound_rx) = lock(&self.outbound_rx).take() else {
            return Err(ChannelError::AlreadyTerminated);
        };
        tokio::spawn(run_connection(Arc::clone(&self.shared), outbound_rx));
        Ok(())
    }

    /// Inbound messages in arrival order.
    ///
    /// The stream ends without an item on a clean close, or yields exactly one `Err`
    /// and then ends on failure. The receiving half can be taken once; later calls
    /// return an empty stream.
    pub fn received_messages(&self) -> BoxStream<'static, Inbound<In>> {
        match lock(&self.inbound_rx).take() {
            Some(rx) => receiver_stream(rx).boxed(),
            None => {
                debug!("Inbound messages of {} already taken", self.shared.endpoint);
                stream::empty().boxed()
            }
        }
    }

    /// Encodes `value` and writes it as one text frame.
    ///
    /// Resolves once the frame has been handed to the socket. There is no retry; a
    /// failed send leaves the channel open and the caller decides what to do.
    pub async fn send(&self, value: &Out) -> Result<(), ChannelError> {
        let body = serde_json::to_string(value).map_err(ChannelError::encode)?;

        match self.state() {
            ChannelState::Idle => {
                return Err(ChannelError::Transport("channel has not been opened".into()));
            }
            ChannelState::Terminated(_) => return Err(ChannelError::AlreadyTerminated),
            ChannelState::Connecting | ChannelState::Open => {}
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.shared
            .outbound
            .send(Outbound::Frame(Message::Text(body), ack_tx))
            .map_err(|_| ChannelError::Transport("channel writer has stopped".into()))?;
        ack_rx
            .await
            .map_err(|_| ChannelError::Transport("channel closed before the frame was written".into()))?
    }
}

impl<In, Out> DuplexChannel<In, Out> {
    /// Endpoint URL this channel connects to.
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Terminates the channel with a normal closure. Idempotent.
    ///
    /// The receive stream ends right away. The close frame is flushed by the writer task
    /// and may reach the peer after this returns; when called during the handshake it
    /// is sent as soon as the handshake completes.
    pub fn terminate(&self) {
        self.shared.finish(None);
    }
}

impl<In, Out> Drop for DuplexChannel<In, Out> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> impl Stream<Item = T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

async fn run_connection<In>(shared: Arc<Shared<In>>, outbound_rx: mpsc::UnboundedReceiver<Outbound>)
where
    In: DeserializeOwned + Send + 'static,
{
    let mut stopped = shared.stopped.subscribe();
    let socket = match connect_async(shared.endpoint.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            shared.finish(Some(ChannelError::Transport(e.to_string())));
            return;
        }
    };
    info!("Channel connected to {}", shared.endpoint);
    shared.mark_open();

    // The writer always runs: if the channel was terminated during the handshake its
    // close frame is already queued and goes out first thing.
    let (sink, source) = socket.split();
    tokio::spawn(write_loop(sink, outbound_rx));

    tokio::select! {
        outcome = receive_loop(source, &shared) => {
            shared.finish(outcome);
        }
        _ = stopped.wait_for(|stopped| *stopped) => {
            debug!("Receive loop of {} stopped", shared.endpoint);
        }
    }
}

async fn write_loop<S>(mut sink: S, mut outbound_rx: mpsc::UnboundedReceiver<Outbound>)
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Some(outbound) = outbound_rx.recv().await {
        match outbound {
            Outbound::Frame(message, ack) => {
                let result = sink
                    .send(message)
                    .await
                    .map_err(|e| ChannelError::Transport(e.to_string()));
                let _ = ack.send(result);
            }
            Outbound::Close(frame) => {
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("Failed to send close frame: {}", e);
                }
                let _ = sink.close().await;
                break;
            }
        }
    }
}

/// Runs until the connection ends. Returns `None` for a clean close by the peer.
async fn receive_loop<In, S>(mut source: S, shared: &Shared<In>) -> Option<ChannelError>
where
    In: DeserializeOwned,
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<In>(&text) {
                Ok(message) => shared.deliver(message),
                Err(e) => {
                    debug!("Undecodable frame from {}: {}", shared.endpoint, text);
                    return Some(ChannelError::decode(e, text));
                }
            },
            Ok(Message::Binary(_)) => return Some(ChannelError::InvalidPayload),
            Ok(Message::Close(_)) => return None,
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(tungstenite::Error::Utf8) => return Some(ChannelError::InvalidPayload),
            Err(e) => return Some(ChannelError::Transport(e.to_string())),
        }
    }
    Some(ChannelError::Transport(
        "connection closed without a close frame".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn close_codes_follow_terminal_reason() {
        let decode = ChannelError::decode(
            serde_json::from_str::<serde_json::Value>("nope").unwrap_err(),
            "nope",
        );

        assert_eq!(close_code(None), CloseCode::Normal);
        assert_eq!(close_code(Some(&decode)), CloseCode::Invalid);
        assert_eq!(close_code(Some(&ChannelError::InvalidPayload)), CloseCode::Invalid);
        assert_eq!(
            close_code(Some(&ChannelError::Transport("reset".into()))),
            CloseCode::Abnormal
        );
        assert_eq!(close_code(Some(&ChannelError::AlreadyTerminated)), CloseCode::Abnormal);

        // Non-string map keys cannot be encoded as JSON.
        let encode = serde_json::to_string(&HashMap::from([((1, 2), 3)])).unwrap_err();
        assert_eq!(
            close_code(Some(&ChannelError::encode(encode))),
            CloseCode::Abnormal
        );
    }

    #[tokio::test]
    async fn terminated_channel_refuses_to_open_and_send() {
        let channel: DuplexChannel<String, String> = DuplexChannel::new("ws://127.0.0.1:9");
        channel.terminate();
        channel.terminate();

        assert_eq!(channel.endpoint(), "ws://127.0.0.1:9");
        assert!(channel.state().is_terminated());
        assert!(matches!(channel.open(), Err(ChannelError::AlreadyTerminated)));
        assert!(matches!(
            channel.send(&"hi".to_string()).await,
            Err(ChannelError::AlreadyTerminated)
        ));
    }

    #[tokio::test]
    async fn idle_channel_refuses_to_send() {
        let channel: DuplexChannel<String, String> = DuplexChannel::new("ws://127.0.0.1:9");

        assert!(matches!(
            channel.send(&"hi".to_string()).await,
            Err(ChannelError::Transport(_))
        ));
        assert!(matches!(channel.state(), ChannelState::Idle));
    }

    #[tokio::test]
    async fn clean_terminate_ends_stream_without_error() {
        let channel: DuplexChannel<String, String> = DuplexChannel::new("ws://127.0.0.1:9");
        let mut messages = channel.received_messages();
        channel.terminate();

        assert!(messages.next().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_terminates_with_transport_error() {
        // Bind and drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let channel: DuplexChannel<String, String> =
            DuplexChannel::new(format!("ws://127.0.0.1:{}", port));
        let mut messages = channel.received_messages();
        channel.open().unwrap();

        let first = tokio::time::timeout(std::time::Duration::from_secs(5), messages.next())
            .await
            .unwrap();
        assert!(matches!(first, Some(Err(ChannelError::Transport(_)))));
        assert!(messages.next().await.is_none());
        assert!(matches!(
            channel.state(),
            ChannelState::Terminated(Some(ChannelError::Transport(_)))
        ));
    }
}
