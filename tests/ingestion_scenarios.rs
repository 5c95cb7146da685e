//! Crate-level integration tests for the literal scenarios in the system
//! overview's testable-properties section, against the in-memory fakes in
//! `tests/common`.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;

use common::{tracked_item, InMemoryStore, ScriptedUpstreamClient};
use item_price_ingestor::item_health::ItemHealthMap;
use item_price_ingestor::key_manager::KeyManager;
use item_price_ingestor::models::{AlertKind, ApiCredential, ItemCatalogEntry, PriceSource, PriceUpdate, UserAlert};
use item_price_ingestor::upstream::UpstreamError;
use item_price_ingestor::utils::crypto::{encrypt_credential, EncryptedKey};
use item_price_ingestor::workers::{AlertEvaluator, BazaarPoller, CatalogSync};

// Scenario 1: Phase split.
#[tokio::test]
async fn phase_split_issues_watched_plus_budget_remainder() {
    let store = Arc::new(InMemoryStore::new());
    for id in 1..=6 {
        store.seed_item(tracked_item(id, 5_000));
        store.seed_watch(id);
    }
    for id in 100..200 {
        store.seed_item(tracked_item(id, 5_000));
    }

    let upstream = Arc::new(ScriptedUpstreamClient::new());
    let item_health = Arc::new(ItemHealthMap::new());
    let (alert_tx, _alert_rx) = tokio::sync::mpsc::channel(256);

    let poller = Arc::new(BazaarPoller::new(
        store.clone(),
        upstream.clone(),
        item_health,
        alert_tx,
        StdDuration::from_secs(30),
        60,
        50,
        CancellationToken::new(),
    ));

    poller.run_tick().await;

    let calls = upstream.bazaar_calls.lock().unwrap();
    assert_eq!(calls.len(), 30, "budget of 30 must be fully issued");
    for watched_id in 1..=6 {
        assert!(calls.contains(&watched_id), "every watched item must be fetched");
    }
}

// Scenario 2: Cooldown entry.
#[tokio::test]
async fn three_consecutive_failures_enter_cooldown() {
    let store = Arc::new(InMemoryStore::new());
    store.seed_item(tracked_item(42, 5_000));
    store.seed_watch(42);

    let upstream = Arc::new(ScriptedUpstreamClient::new());
    for _ in 0..3 {
        upstream.queue_bazaar(42, Err(UpstreamError::TransientHttp { status: 500 }));
    }

    let item_health = Arc::new(ItemHealthMap::new());
    let (alert_tx, _alert_rx) = tokio::sync::mpsc::channel(256);

    let poller = Arc::new(BazaarPoller::new(
        store,
        upstream.clone(),
        item_health.clone(),
        alert_tx,
        StdDuration::from_secs(30),
        60,
        50,
        CancellationToken::new(),
    ));

    for _ in 0..3 {
        poller.clone().run_tick().await;
    }
    assert!(item_health.in_cooldown(42));

    poller.clone().run_tick().await;
    let calls = upstream.bazaar_calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|&&id| id == 42).count(), 3, "the 4th tick must not fetch item 42");
}

// Scenario 4: Alert dedup.
#[tokio::test]
async fn duplicate_listing_is_suppressed_distinct_listing_is_not() {
    let store = Arc::new(InMemoryStore::new());
    store.seed_alert(UserAlert { user_id: 7, item_id: 5, price_above: None, price_below: Some(500), change_percent: None });

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel(10);
    let (_update_tx, update_rx) = tokio::sync::mpsc::channel(1);

    let evaluator = AlertEvaluator::new(
        store,
        update_rx,
        outbound_tx,
        StdDuration::from_secs(0),
        0.05,
        CancellationToken::new(),
    );

    let base_update = PriceUpdate {
        item_id: 5,
        item_name: "Xanax".to_string(),
        price: 400,
        source: PriceSource::Bazaar,
        quantity: 1,
        seller_id: Some(11),
        listing_id: Some(99),
        previous_price: None,
    };

    evaluator.handle_update(base_update.clone()).await;
    evaluator.handle_update(base_update.clone()).await;
    let mut duplicate = base_update.clone();
    duplicate.listing_id = Some(100);
    evaluator.handle_update(duplicate).await;

    drop(evaluator);

    let mut received = Vec::new();
    while let Ok(alert) = outbound_rx.try_recv() {
        received.push(alert);
    }

    assert_eq!(received.len(), 2, "identical listing must dedup, distinct listing must not");
    assert!(received.iter().all(|a| a.kind == AlertKind::Below));
}

// Scenario 5: Credential rotation (one reported failure shifts the rotation by one).
#[tokio::test]
async fn credential_rotation_skips_a_failed_credential_for_one_turn() {
    let key = vec![4u8; 32];
    let cred = |id: i64, plaintext: &str| {
        let encrypted: EncryptedKey = encrypt_credential(plaintext, &key).unwrap();
        ApiCredential::new(id, encrypted, format!("cred-{id}"))
    };

    let store = Arc::new(InMemoryStore::new());
    let manager = KeyManager::new(vec![cred(1, "a"), cred(2, "b")], key, vec![], store);

    let first_round: Vec<i64> = (0..4).map(|_| manager.next().unwrap().unwrap().0).collect();
    assert_eq!(first_round, vec![1, 2, 1, 2]);

    manager.record(1, false).await;

    let second_round: Vec<i64> = (0..4).map(|_| manager.next().unwrap().unwrap().0).collect();
    assert_eq!(second_round, vec![2, 1, 2, 1], "reporting one failure on A rotates B,A,B,A next");
}

// Scenario 6: Catalog retirement.
#[tokio::test]
async fn zero_circulation_retires_an_item_without_touching_price_cache() {
    let store = Arc::new(InMemoryStore::new());
    let mut item = tracked_item(77, 50);
    item.last_market_price = Some(1_000);
    store.seed_item(item);

    let upstream = Arc::new(ScriptedUpstreamClient::new());
    upstream.catalog.lock().unwrap().insert(
        77,
        ItemCatalogEntry {
            id: 77,
            name: "Relic".to_string(),
            description: String::new(),
            item_type: "Misc".to_string(),
            circulation: 0,
            market_value: 0,
        },
    );

    let sync = CatalogSync::new(store.clone(), upstream, StdDuration::from_secs(86_400), CancellationToken::new());
    sync.sync_once().await.unwrap();

    let items = store.items.lock().unwrap();
    let item = items.get(&77).unwrap();
    assert!(!item.is_tracked);
    assert_eq!(item.last_market_price, Some(1_000));
}
