//! Instrument service: cache, broadcast and synthetic market in one place.
//!
//! The service owns the cache of every instrument and, while someone is streaming, one
//! active cycle made of:
//! - an `InstrumentStreamer` with its channel,
//! - the snapshot broadcast all subscribers share,
//! - the inbound task writing echoed instruments into the cache,
//! - the tick task republishing the cache and sending synthetic moves.
//!
//! Locking: `cache` and the active cycle live in one `Mutex<ServiceState>`. Lock sections
//! never await and never touch the network; they copy out what the I/O needs. The
//! `updating` flag is a separate `watch` channel so it can be observed and flipped
//! without the lock.
//!
//! Every cycle has a generation number. Background tasks act only while their
//! generation is still the active one, so nothing from a terminated cycle can publish
//! after `terminate` returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use feed_common::instrument::sort_by_price_desc;
use feed_common::{Instrument, StockError, StreamError};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};

use crate::config::ServiceConfig;
use crate::repository::InstrumentRepository;
use crate::streamer::InstrumentStreamer;
use crate::subscription::{InstrumentSubscription, Publication, Subscription};
use crate::synthetic;

/// Cache-and-publish service over a simulated instrument feed.
pub struct InstrumentService {
    inner: Arc<Inner>,
}

struct Inner {
    repository: Arc<dyn InstrumentRepository>,
    config: ServiceConfig,
    state: Mutex<ServiceState>,
    updating: watch::Sender<bool>,
}

struct ServiceState {
    cache: HashMap<String, Instrument>,
    active: Option<ActiveCycle>,
    generation: u64,
}

struct ActiveCycle {
    generation: u64,
    streamer: Arc<InstrumentStreamer>,
    publisher: watch::Sender<Publication>,
    inbound: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Drop for ActiveCycle {
    fn drop(&mut self) {
        if let Some(task) = self.ticker.take() {
            task.abort();
        }
        if let Some(task) = self.inbound.take() {
            task.abort();
        }
        self.streamer.terminate();
    }
}

impl ServiceState {
    fn snapshot(&self) -> Vec<Instrument> {
        let mut snapshot: Vec<Instrument> = self.cache.values().cloned().collect();
        sort_by_price_desc(&mut snapshot);
        snapshot
    }

    fn cycle(&mut self, generation: u64) -> Option<&mut ActiveCycle> {
        self.active
            .as_mut()
            .filter(|cycle| cycle.generation == generation)
    }
}

impl InstrumentService {
    /// Builds a service seeded from `repository.instruments()`. Nothing is connected
    /// until the first `subscribe`.
    pub fn new(repository: Arc<dyn InstrumentRepository>, config: ServiceConfig) -> Self {
        let cache = repository
            .instruments()
            .into_iter()
            .map(|instrument| (instrument.ticker.clone(), instrument))
            .collect();
        let (updating, _) = watch::channel(false);
        InstrumentService {
            inner: Arc::new(Inner {
                repository,
                config,
                state: Mutex::new(ServiceState {
                    cache,
                    active: None,
                    generation: 0,
                }),
                updating,
            }),
        }
    }

    /// Joins the live snapshot stream, starting a new cycle if none is running.
    ///
    /// The first item is the current cache, available immediately and independent of
    /// the channel handshake. Subscribers share one cycle; only the first caller opens
    /// a channel. Must be called from within a Tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        self.inner.subscribe()
    }

    /// Follows one instrument. Yields `NotFound` once if `ticker` is not in the cache.
    pub fn get(&self, ticker: &str) -> InstrumentSubscription {
        self.subscribe().for_ticker(ticker)
    }

    /// Resumes publishing snapshots.
    pub fn resume(&self) {
        self.inner.updating.send_replace(true);
    }

    /// Stops publishing snapshots. The channel, the cache and the synthetic market keep
    /// running; the next tick after `resume` carries everything that changed meanwhile.
    pub fn pause(&self) {
        self.inner.updating.send_replace(false);
    }

    /// Observable pause/resume state.
    pub fn is_updating(&self) -> watch::Receiver<bool> {
        self.inner.updating.subscribe()
    }

    /// Ends the active cycle cleanly. Subscribers see the end of their stream.
    ///
    /// Returns `false` if no cycle was running. Ticks and inbound processing stop before
    /// this returns; the channel close may complete afterwards.
    pub fn terminate(&self) -> bool {
        self.inner.terminate(None, None)
    }

    /// Whether a streaming cycle is running.
    pub fn is_streaming(&self) -> bool {
        self.inner.state().active.is_some()
    }
}

impl Drop for InstrumentService {
    fn drop(&mut self) {
        self.inner.terminate(None, None);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(self: &Arc<Self>) -> Subscription {
        let (generation, streamer, updates, subscription) = {
            let mut state = self.state();
            if let Some(cycle) = state.active.as_ref() {
                return Subscription::new(cycle.publisher.subscribe());
            }

            self.updating.send_replace(true);
            let (publisher, _) = watch::channel(Publication::Snapshot(state.snapshot()));
            let subscription = Subscription::new(publisher.subscribe());
            let streamer = Arc::new(self.repository.streamer());
            let updates = streamer.live_updates();

            state.generation += 1;
            let generation = state.generation;
            state.active = Some(ActiveCycle {
                generation,
                streamer: Arc::clone(&streamer),
                publisher,
                inbound: None,
                ticker: None,
            });
            (generation, streamer, updates, subscription)
        };
        info!("Starting streaming cycle {}", generation);

        if let Err(err) = streamer.start() {
            self.terminate(Some(generation), Some(err.into()));
            return subscription;
        }

        let mut state = self.state();
        if let Some(cycle) = state.cycle(generation) {
            let weak = Arc::downgrade(self);
            cycle.inbound = Some(tokio::spawn(observe_inbound(weak.clone(), generation, updates)));
            cycle.ticker = Some(tokio::spawn(run_ticks(
                weak,
                generation,
                self.config.tick_interval,
            )));
        }
        subscription
    }

    /// Stores an echoed instrument. Unknown tickers are dropped so the key set never changes.
    fn store(&self, instrument: Instrument) {
        let description = self.repository.description(&instrument.ticker);
        let instrument = instrument.with_description(description);

        let mut state = self.state();
        match state.cache.get_mut(&instrument.ticker) {
            Some(slot) => *slot = instrument,
            None => warn!("Ignoring update for unknown ticker {}", instrument.ticker),
        }
    }

    /// One tick of cycle `generation`. Returns `false` once that cycle is gone.
    fn tick(&self, generation: u64) -> bool {
        let publish = *self.updating.borrow();
        let (streamer, current) = {
            let mut state = self.state();
            let snapshot = publish.then(|| state.snapshot());
            let Some(cycle) = state.cycle(generation) else {
                return false;
            };
            if let Some(snapshot) = snapshot {
                cycle.publisher.send_replace(Publication::Snapshot(snapshot));
            }
            let streamer = Arc::clone(&cycle.streamer);
            (streamer, state.cache.values().cloned().collect::<Vec<_>>())
        };

        let moves = synthetic::next_moves(&current, &self.config.market, &mut rand::rng());
        send_moves(&streamer, moves).detach_all();
        true
    }

    /// Ends the active cycle, or only cycle `generation` when given.
    fn terminate(&self, generation: Option<u64>, failure: Option<StockError>) -> bool {
        let cycle = {
            let mut state = self.state();
            let matches = state
                .active
                .as_ref()
                .is_some_and(|cycle| generation.is_none_or(|g| g == cycle.generation));
            if !matches {
                return false;
            }
            let Some(cycle) = state.active.take() else {
                return false;
            };
            self.updating.send_replace(false);
            let publication = match failure {
                None => Publication::Finished,
                Some(err) => {
                    warn!("Streaming cycle {} failed: {}", cycle.generation, err);
                    Publication::Failed(err)
                }
            };
            cycle.publisher.send_replace(publication);
            cycle
        };
        info!("Streaming cycle {} terminated", cycle.generation);
        // Aborts the tasks and closes the channel.
        drop(cycle);
        true
    }
}

/// Sends every proposal on its own task. Each failure is logged and reported by its own
/// task only; the tick neither waits for the sends nor sees their outcome.
fn send_moves(
    streamer: &Arc<InstrumentStreamer>,
    moves: Vec<Instrument>,
) -> JoinSet<Result<(), String>> {
    let mut sends = JoinSet::new();
    for proposal in moves {
        let streamer = Arc::clone(streamer);
        sends.spawn(async move {
            streamer.update(&proposal).await.map_err(|e| {
                warn!("Failed to send update for {}: {}", proposal.ticker, e);
                proposal.ticker
            })
        });
    }
    sends
}

async fn observe_inbound(
    inner: Weak<Inner>,
    generation: u64,
    mut updates: BoxStream<'static, Result<Instrument, StreamError>>,
) {
    let failure = loop {
        match updates.next().await {
            Some(Ok(instrument)) => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                debug!("Echo {} @ {}", instrument.ticker, instrument.price);
                inner.store(instrument);
            }
            Some(Err(err)) => break Some(StockError::from(err)),
            None => break None,
        }
    };
    if let Some(inner) = inner.upgrade() {
        inner.terminate(Some(generation), failure);
    }
}

async fn run_ticks(inner: Weak<Inner>, generation: u64, period: std::time::Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.tick(generation) {
            break;
        }
    }
}
