mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{PeerEvent, ScriptedExchange, WAIT, repository};
use feed_common::{ChannelError, Instrument, PriceChange, StockError, StreamError};
use feed_core::{
    CatalogRepository, InstrumentRepository, InstrumentService, InstrumentStreamer,
    ServiceConfig, Subscription,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use tokio::time::{sleep, timeout};

const TICK: Duration = Duration::from_millis(50);

const SEED: &[(&str, &str, i64)] = &[("AAPL", "Apple Inc.", 100), ("MSFT", "Microsoft", 200)];

fn service(url: &str, seed: &[(&str, &str, i64)]) -> InstrumentService {
    InstrumentService::new(repository(url, seed), ServiceConfig::with_tick_interval(TICK))
}

fn prices(snapshot: &[Instrument]) -> Vec<(String, Decimal)> {
    snapshot
        .iter()
        .map(|i| (i.ticker.clone(), i.price))
        .collect()
}

async fn next_snapshot(subscription: &mut Subscription) -> Vec<Instrument> {
    timeout(WAIT, subscription.next())
        .await
        .expect("no snapshot in time")
        .expect("stream ended")
        .expect("stream failed")
}

/// Reads snapshots until one satisfies `accept`.
async fn snapshot_where<F>(subscription: &mut Subscription, accept: F) -> Vec<Instrument>
where
    F: Fn(&[Instrument]) -> bool,
{
    loop {
        let snapshot = next_snapshot(subscription).await;
        if accept(&snapshot) {
            return snapshot;
        }
    }
}

fn assert_sorted(snapshot: &[Instrument]) {
    assert!(
        snapshot.windows(2).all(|pair| pair[0].price >= pair[1].price),
        "snapshot not sorted: {:?}",
        prices(snapshot)
    );
}

#[tokio::test]
async fn first_snapshot_is_sorted_and_inbound_updates_reorder_it() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut subscription = service.subscribe();

    let first = next_snapshot(&mut subscription).await;
    assert_eq!(
        prices(&first),
        [("MSFT".into(), Decimal::from(200)), ("AAPL".into(), Decimal::from(100))]
    );
    assert!(*service.is_updating().borrow());

    let peer = exchange.next_peer().await;
    peer.send_instrument("AAPL", "Apple Inc.", "250.00", "increased");

    let updated = snapshot_where(&mut subscription, |s| s[0].ticker == "AAPL").await;
    assert_eq!(
        prices(&updated),
        [("AAPL".into(), Decimal::from(250)), ("MSFT".into(), Decimal::from(200))]
    );
    assert_eq!(updated[0].price_change, PriceChange::Increased);
    assert_eq!(updated[0].description.as_deref(), Some("AAPL description"));
}

#[tokio::test]
async fn tick_sends_one_synthetic_move_per_instrument() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let _subscription = service.subscribe();
    let mut peer = exchange.next_peer().await;

    let mut seen = BTreeSet::new();
    while seen.len() < 2 {
        let Some(PeerEvent::Text(text)) = peer.next_event().await else {
            panic!("no synthetic updates sent");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json.get("description").is_none());
        seen.insert(json["ticker"].as_str().unwrap().to_string());
    }
    assert_eq!(seen.into_iter().collect::<Vec<_>>(), ["AAPL", "MSFT"]);
}

#[tokio::test]
async fn echoed_moves_reach_the_cache_and_keep_the_key_set() {
    let seed = &[
        ("AAPL", "Apple Inc.", 190),
        ("MSFT", "Microsoft", 375),
        ("NVDA", "NVIDIA", 495),
        ("KO", "Coca-Cola", 63),
    ];
    let exchange = ScriptedExchange::echo().await;
    let service = service(exchange.url(), seed);
    let mut subscription = service.subscribe();
    let first = next_snapshot(&mut subscription).await;

    let moved = snapshot_where(&mut subscription, |s| prices(s) != prices(&first)).await;
    assert_sorted(&moved);

    let tickers = |s: &[Instrument]| s.iter().map(|i| i.ticker.clone()).collect::<BTreeSet<_>>();
    assert_eq!(tickers(&moved), tickers(&first));
    assert!(moved.iter().all(|i| i.description.is_some()));

    for _ in 0..5 {
        let snapshot = next_snapshot(&mut subscription).await;
        assert_eq!(tickers(&snapshot), tickers(&first));
        assert_sorted(&snapshot);
    }
}

#[tokio::test]
async fn unknown_tickers_never_enter_the_cache() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut subscription = service.subscribe();
    next_snapshot(&mut subscription).await;
    let peer = exchange.next_peer().await;

    peer.send_instrument("ZZZZ", "Nobody", "999", "increased");
    peer.send_instrument("MSFT", "Microsoft", "201", "increased");

    let snapshot = snapshot_where(&mut subscription, |s| s[0].price == Decimal::from(201)).await;
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().all(|i| i.ticker != "ZZZZ"));
}

#[tokio::test]
async fn subscribers_share_one_channel() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut first = service.subscribe();
    let mut second = service.subscribe();

    let _peer = exchange.next_peer().await;
    next_snapshot(&mut first).await;
    next_snapshot(&mut second).await;
    sleep(TICK * 4).await;

    assert!(!exchange.has_pending_peer());
}

#[tokio::test]
async fn pause_holds_snapshots_until_resume() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut subscription = service.subscribe();
    next_snapshot(&mut subscription).await;
    let peer = exchange.next_peer().await;
    let mut updating = service.is_updating();

    service.pause();
    assert!(!*updating.borrow_and_update());
    // Let a tick that raced with `pause` land, then drop it.
    sleep(TICK * 2).await;
    if subscription.has_pending() {
        next_snapshot(&mut subscription).await;
    }

    peer.send_instrument("AAPL", "Apple Inc.", "250", "increased");
    assert!(timeout(TICK * 6, subscription.next()).await.is_err());
    assert!(service.is_streaming());

    service.resume();
    assert!(*updating.borrow_and_update());
    let resumed = next_snapshot(&mut subscription).await;
    assert_eq!(resumed[0].ticker, "AAPL");
    assert_eq!(resumed[0].price, Decimal::from(250));
}

#[tokio::test]
async fn decode_failure_ends_stream_and_resubscribe_starts_fresh_channel() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut subscription = service.subscribe();
    let first = next_snapshot(&mut subscription).await;
    let peer = exchange.next_peer().await;

    peer.send_text("certainly not json");

    let failure = loop {
        match timeout(WAIT, subscription.next()).await.unwrap() {
            Some(Ok(_)) => continue,
            Some(Err(err)) => break err,
            None => panic!("stream ended without an error"),
        }
    };
    assert!(matches!(
        failure,
        StockError::Networking(StreamError::Networking(ChannelError::Decode { .. }))
    ));
    assert!(subscription.next().await.is_none());
    assert!(!service.is_streaming());
    assert!(!*service.is_updating().borrow());

    let mut again = service.subscribe();
    let restarted = next_snapshot(&mut again).await;
    assert_eq!(prices(&restarted), prices(&first));

    let peer = exchange.next_peer().await;
    peer.send_instrument("AAPL", "Apple Inc.", "300", "increased");
    let updated = snapshot_where(&mut again, |s| s[0].ticker == "AAPL").await;
    assert_eq!(updated[0].price, Decimal::from(300));
}

#[tokio::test]
async fn terminate_twice_ends_the_stream_once() {
    let mut exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut subscription = service.subscribe();
    next_snapshot(&mut subscription).await;
    let mut peer = exchange.next_peer().await;

    assert!(service.terminate());
    assert!(!service.terminate());

    while let Some(item) = timeout(WAIT, subscription.next()).await.unwrap() {
        assert!(item.is_ok(), "clean terminate must not surface an error");
    }
    assert!(subscription.next().await.is_none());
    assert!(!service.is_streaming());
    assert!(!*service.is_updating().borrow());
    assert_eq!(peer.close_code().await, Some(1000));
}

#[tokio::test]
async fn get_reports_missing_ticker_without_disturbing_others() {
    let exchange = ScriptedExchange::start().await;
    let service = service(exchange.url(), SEED);
    let mut watchlist = service.subscribe();
    next_snapshot(&mut watchlist).await;

    let mut missing = service.get("ZZZZ");
    assert!(matches!(
        timeout(WAIT, missing.next()).await.unwrap(),
        Some(Err(StockError::NotFound(ticker))) if ticker == "ZZZZ"
    ));
    assert!(missing.next().await.is_none());

    let mut msft = service.get("MSFT");
    let instrument = timeout(WAIT, msft.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(instrument.price, Decimal::from(200));

    assert!(service.is_streaming());
    next_snapshot(&mut watchlist).await;
}

#[tokio::test]
async fn unreachable_exchange_fails_subscribers_after_the_seed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let service = service(&url, SEED);
    let mut subscription = service.subscribe();

    let seed = next_snapshot(&mut subscription).await;
    assert_eq!(
        prices(&seed),
        [("MSFT".into(), Decimal::from(200)), ("AAPL".into(), Decimal::from(100))]
    );
    // A tick may publish before the connection attempt fails.
    let failure = loop {
        match timeout(WAIT, subscription.next()).await.unwrap() {
            Some(Ok(_)) => continue,
            Some(Err(err)) => break err,
            None => panic!("stream ended without an error"),
        }
    };
    assert!(matches!(
        failure,
        StockError::Networking(StreamError::Networking(ChannelError::Transport(_)))
    ));
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
    assert!(!service.is_streaming());
}

/// Serves the seed from a catalog but hands out streamers that can no longer start.
struct ClosedStreamRepository {
    catalog: Arc<CatalogRepository>,
}

impl InstrumentRepository for ClosedStreamRepository {
    fn instruments(&self) -> Vec<Instrument> {
        self.catalog.instruments()
    }

    fn streamer(&self) -> InstrumentStreamer {
        let streamer = self.catalog.streamer();
        streamer.terminate();
        streamer
    }

    fn description(&self, ticker: &str) -> Option<String> {
        self.catalog.description(ticker)
    }
}

#[tokio::test]
async fn failed_start_still_delivers_the_seed_first() {
    let exchange = ScriptedExchange::start().await;
    let closed = Arc::new(ClosedStreamRepository {
        catalog: repository(exchange.url(), SEED),
    });
    let service = InstrumentService::new(closed, ServiceConfig::with_tick_interval(TICK));
    let mut subscription = service.subscribe();

    let seed = next_snapshot(&mut subscription).await;
    assert_eq!(
        prices(&seed),
        [("MSFT".into(), Decimal::from(200)), ("AAPL".into(), Decimal::from(100))]
    );
    assert!(matches!(
        timeout(WAIT, subscription.next()).await.unwrap(),
        Some(Err(StockError::Networking(StreamError::Networking(
            ChannelError::AlreadyTerminated
        ))))
    ));
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
    assert!(!service.is_streaming());
}

#[tokio::test]
async fn ticks_keep_publishing_while_sends_are_stuck() {
    // Accepts TCP connections but never answers the WebSocket handshake, so every
    // outbound send stays queued.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let held = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });

    let service = service(&url, SEED);
    let mut subscription = service.subscribe();
    for _ in 0..4 {
        let snapshot = next_snapshot(&mut subscription).await;
        assert_eq!(snapshot.len(), SEED.len());
    }
    assert!(service.is_streaming());

    assert!(service.terminate());
    held.abort();
}
