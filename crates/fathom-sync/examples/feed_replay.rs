//! Replay a scripted feed through the service and query the result.
//!
//! Run with: cargo run --example feed_replay

use chrono::Utc;
use fathom_book::{BookSnapshot, DepthOptions};
use fathom_sync::{BookService, FeedEvent};
use fathom_types::{Asset, BookKey, Level, Pair, Update};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    let key = BookKey::new("kraken", Pair::new("BTC", "USD"), Asset::Spot);
    let service = Arc::new(BookService::new());
    service.subscribe(key.clone(), DepthOptions::new().with_max_depth(100));

    let (event_tx, event_rx) = mpsc::channel(64);
    let (req_tx, mut req_rx) = mpsc::channel(8);
    let pump_service = Arc::clone(&service);
    let pump = tokio::spawn(async move { pump_service.pump(event_rx, req_tx).await });

    // A diff lands before any snapshot exists
    event_tx
        .send(FeedEvent::Update(Update {
            exchange: key.exchange.clone(),
            pair: key.pair.clone(),
            asset: key.asset,
            first_update_id: 101,
            final_update_id: 103,
            bids: vec![Level::new(68_999.0, 0.75)],
            asks: vec![Level::new(69_001.0, 0.25)],
            timestamp: Utc::now(),
            checksum: None,
        }))
        .await
        .unwrap();

    // The service asks for a snapshot; a real deployment would fetch it
    // over REST here
    let requested = req_rx.recv().await.unwrap();
    println!("snapshot requested for {requested}");

    event_tx
        .send(FeedEvent::Snapshot(
            BookSnapshot::new(&key)
                .with_levels(
                    vec![Level::new(69_000.0, 1.0), Level::new(68_998.0, 2.0)],
                    vec![Level::new(69_002.0, 1.0), Level::new(69_005.0, 2.0)],
                )
                .with_last_update_id(100)
                .with_rest_snapshot(true),
        ))
        .await
        .unwrap();

    drop(event_tx);
    pump.await.unwrap();

    let book = service
        .get_orderbook("kraken", Pair::new("BTC", "USD"), Asset::Spot)
        .unwrap();
    println!(
        "synced book: {} bids / {} asks, cursor {}",
        book.bids.len(),
        book.asks.len(),
        book.last_update_id
    );
    println!("spread: {:?}", book.spread());

    let bomb = book.whale_bomb(69_005.0, true).unwrap();
    println!(
        "quote required to lift asks to 69005: {} ({})",
        bomb.amount, bomb.status
    );
}
