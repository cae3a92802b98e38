//! Error types shared between the exchange, the streaming core and the client.
//!
//! Three layers mirror the streaming stack:
//! - `ChannelError` — failures of one duplex connection attempt.
//! - `StreamError` — the instrument streamer's view of a channel failure.
//! - `StockError` — what service subscribers observe.
//!
//! All three are `Clone` because a single terminal failure is fanned out to every
//! subscriber of the shared snapshot broadcast. `FeedError` unifies the remaining
//! application-level failures (I/O, catalog parsing, WebSocket serving) so binaries can propagate
//! a single error type.
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failure of a single duplex channel.
///
/// Any variant other than `AlreadyTerminated` returned from a send is local to that
/// send; any variant delivered through the receive sequence is terminal for the channel.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// The channel has already completed or has been terminated.
    #[error("channel has already completed or has been terminated")]
    AlreadyTerminated,

    /// The underlying socket failed to connect, read or write.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound value could not be serialized to JSON.
    #[error("error encoding a channel message: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// An inbound text frame could not be decoded; `raw` keeps the offending payload.
    #[error("error decoding a channel message: {source}; raw payload: {raw}")]
    Decode {
        /// Decoder error.
        #[source]
        source: Arc<serde_json::Error>,
        /// Frame text as received.
        raw: String,
    },

    /// The peer sent a frame that is not a text frame.
    #[error("invalid payload received by the channel")]
    InvalidPayload,
}

impl ChannelError {
    /// Wrap a JSON encoding error.
    pub fn encode(err: serde_json::Error) -> Self {
        ChannelError::Encode(Arc::new(err))
    }

    /// Wrap a JSON decoding error together with the payload that caused it.
    pub fn decode(err: serde_json::Error, raw: impl Into<String>) -> Self {
        ChannelError::Decode {
            source: Arc::new(err),
            raw: raw.into(),
        }
    }

    /// Whether the failure was caused by the content of a frame rather than the socket.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, ChannelError::Decode { .. } | ChannelError::InvalidPayload)
    }
}

/// Failure surfaced by the instrument streamer.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The underlying channel failed.
    #[error("networking error: {0}")]
    Networking(#[from] ChannelError),
}

/// Failure surfaced to service subscribers.
#[derive(Error, Debug, Clone)]
pub enum StockError {
    /// The live stream died; re-subscribe to start a fresh channel.
    #[error("networking error: {0}")]
    Networking(#[from] StreamError),

    /// The requested ticker is not part of the instrument set.
    #[error("instrument not found: {0}")]
    NotFound(String),
}

impl From<ChannelError> for StockError {
    fn from(err: ChannelError) -> Self {
        StockError::Networking(StreamError::Networking(err))
    }
}

/// Unified error type for application-level failures.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// A catalog line could not be parsed into an instrument.
    #[error("Parse catalog error at line {line}: {reason}")]
    ParseCatalog {
        /// 1-based line number in the catalog source.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// WebSocket handshake or framing failure outside of a duplex channel.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Streaming failure reported by the instrument service.
    #[error(transparent)]
    Stock(#[from] StockError),
}
