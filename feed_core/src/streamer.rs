//! Instrument streamer: translation between the wire format and the domain model.
//!
//! An `InstrumentStreamer` owns exactly one `DuplexChannel` for its whole lifetime and
//! keeps no other state. Keeping it apart from the service lets the wire format change
//! without touching orchestration.

use feed_common::{Instrument, InstrumentMessage, PriceChange, PriceChangeDto, StreamError};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::debug;

use crate::channel::{ChannelState, DuplexChannel};

/// Duplex channel carrying instrument messages both ways.
pub type InstrumentChannel = DuplexChannel<InstrumentMessage, InstrumentMessage>;

/// Adapter from instrument messages on a channel to domain `Instrument`s.
pub struct InstrumentStreamer {
    channel: InstrumentChannel,
}

impl InstrumentStreamer {
    /// Wraps an idle channel.
    pub fn new(channel: InstrumentChannel) -> Self {
        InstrumentStreamer { channel }
    }

    /// Streamer over a fresh channel to `endpoint`.
    pub fn connect_to(endpoint: impl Into<String>) -> Self {
        InstrumentStreamer::new(DuplexChannel::new(endpoint))
    }

    /// Inbound instruments. Descriptions are left unset; enrichment is the caller's job.
    pub fn live_updates(&self) -> BoxStream<'static, Result<Instrument, StreamError>> {
        self.channel
            .received_messages()
            .map(|message| message.map(instrument_from_wire).map_err(StreamError::Networking))
            .boxed()
    }

    /// Opens the underlying channel.
    pub fn start(&self) -> Result<(), StreamError> {
        debug!("Starting instrument stream to {}", self.channel.endpoint());
        self.channel.open()?;
        Ok(())
    }

    /// Sends `instrument` as one wire message.
    pub async fn update(&self, instrument: &Instrument) -> Result<(), StreamError> {
        self.channel.send(&wire_from_instrument(instrument)).await?;
        Ok(())
    }

    /// Closes the channel. Safe to call more than once.
    pub fn terminate(&self) {
        self.channel.terminate();
    }

    /// State of the underlying channel.
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }
}

fn instrument_from_wire(message: InstrumentMessage) -> Instrument {
    let price_change = match message.price_change {
        PriceChangeDto::Increased => PriceChange::Increased,
        PriceChangeDto::Decreased => PriceChange::Decreased,
        PriceChangeDto::Unchanged => PriceChange::Unchanged,
    };
    Instrument {
        ticker: message.ticker,
        name: message.name,
        price: message.price,
        price_change,
        description: None,
    }
}

fn wire_from_instrument(instrument: &Instrument) -> InstrumentMessage {
    let price_change = match instrument.price_change {
        PriceChange::Increased => PriceChangeDto::Increased,
        PriceChange::Decreased => PriceChangeDto::Decreased,
        PriceChange::Unchanged => PriceChangeDto::Unchanged,
    };
    InstrumentMessage {
        ticker: instrument.ticker.clone(),
        name: instrument.name.clone(),
        price: instrument.price,
        price_change,
    }
}
