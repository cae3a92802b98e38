//!
//! Streaming core of the instrument feed simulator.
//!
//! Layers, leaf first:
//! - `channel` — `DuplexChannel<In, Out>`, typed JSON messages over one WebSocket
//!   connection attempt with an explicit idle → connecting → open → terminated lifecycle.
//! - `streamer` — `InstrumentStreamer`, wire ⇄ domain translation over one channel.
//! - `service` — `InstrumentService`, the cache plus shared snapshot broadcast, the
//!   periodic tick and pause/resume control.
//!
//! Supporting modules:
//! - `repository` — seed data and streamer factory consumed by the service.
//! - `synthetic` — random price moves proposed on every tick.
//! - `subscription` — consumer handles over the broadcast.
//! - `config` — tick period and market parameters.
#![warn(missing_docs)]
pub mod channel;
pub mod config;
pub mod repository;
pub mod service;
pub mod streamer;
pub mod subscription;
pub mod synthetic;

pub use channel::{ChannelState, DuplexChannel};
pub use config::{MarketConfig, ServiceConfig};
pub use repository::{CatalogRepository, InstrumentRepository};
pub use service::InstrumentService;
pub use streamer::InstrumentStreamer;
pub use subscription::{InstrumentSubscription, Subscription};
