//! CloudProviderManager behavior against a scripted connector

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use cloudprov_core::domain::ProviderStatus;
use cloudprov_manager::{
    ChangeEvent, CloudProviderManager, ConnectionPhase, DiscoveryEvent, QueryKind, SyncSummary,
};

use crate::common::{self, ConnectOutcome, ScriptedConnector};

#[tokio::test]
async fn test_single_provider_end_to_end() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let manager = CloudProviderManager::new(connector.clone());
    let (_id, mut rx) = manager.subscribe_channel();

    assert!(manager.add_endpoint(common::endpoint(1)));
    assert_eq!(
        common::next_event(&mut rx).await,
        ChangeEvent::ProviderAdded(common::endpoint(1))
    );

    handle.answer("MyCloud", 2).await;
    let events = common::next_events(&mut rx, 2).await;
    assert!(events
        .iter()
        .all(|e| matches!(e, ChangeEvent::ProviderUpdated { .. })));

    let providers = manager.list_providers();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].name().as_deref(), Some("MyCloud"));
    assert_eq!(providers[0].status(), ProviderStatus::Syncing);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot[0].phase, ConnectionPhase::Ready);
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json[0]["name"], "MyCloud");
    assert_eq!(json[0]["status"], "syncing");
    assert_eq!(json[0]["phase"], "ready");
}

#[tokio::test]
async fn test_every_proxy_event_forwarded_once() {
    let connector = ScriptedConnector::new();
    let mut first = connector.ready(common::endpoint(1));
    let mut second = connector.ready(common::endpoint(2));
    let manager = CloudProviderManager::new(connector.clone());

    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    manager.subscribe(move |event| {
        if matches!(event, ChangeEvent::ProviderUpdated { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    manager.add_endpoint(common::endpoint(1));
    manager.add_endpoint(common::endpoint(2));
    first.answer("One", 1).await;
    second.answer("Two", 3).await;

    common::wait_until(|| updates.load(Ordering::SeqCst) == 4).await;

    manager.refresh_all();
    first.answer("One", 2).await;
    second.answer("Two", 1).await;

    common::wait_until(|| updates.load(Ordering::SeqCst) == 8).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(updates.load(Ordering::SeqCst), 8);

    let p1 = manager.provider(&common::endpoint(1)).unwrap();
    let p2 = manager.provider(&common::endpoint(2)).unwrap();
    assert_eq!(p1.status(), ProviderStatus::Syncing);
    assert_eq!(p2.status(), ProviderStatus::Idle);
}

#[tokio::test]
async fn test_unreachable_providers_are_listed_but_silent() {
    let connector = ScriptedConnector::new();
    connector.set(
        common::endpoint(2),
        ConnectOutcome::Fail("no such name".to_string()),
    );
    let manager = CloudProviderManager::new(connector.clone());
    let (_id, mut rx) = manager.subscribe_channel();

    // endpoint 1 never completes, endpoint 2 fails
    manager.add_endpoint(common::endpoint(1));
    manager.add_endpoint(common::endpoint(2));
    common::next_events(&mut rx, 2).await;
    common::wait_until(|| connector.attempts() == 2).await;

    manager.refresh_all();
    common::assert_quiet(&mut rx).await;

    for proxy in manager.list_providers() {
        assert_eq!(proxy.phase(), ConnectionPhase::Connecting);
        assert!(proxy.name().is_none());
        assert_eq!(proxy.status(), ProviderStatus::Invalid);
    }
}

#[tokio::test]
async fn test_removed_provider_stops_forwarding() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let manager = CloudProviderManager::new(connector.clone());
    let (_id, mut rx) = manager.subscribe_channel();

    manager.add_endpoint(common::endpoint(1));
    common::next_event(&mut rx).await;
    let proxy = manager.provider(&common::endpoint(1)).unwrap();
    assert_eq!(proxy.notifier().subscriber_count(), 1);

    // reply arrives after removal
    let pending = handle.next_name_call().await;
    assert!(manager.remove_endpoint(&common::endpoint(1)));
    assert_eq!(
        common::next_event(&mut rx).await,
        ChangeEvent::ProviderRemoved(common::endpoint(1))
    );
    pending.reply(Ok("Gone".to_string()));

    common::assert_quiet(&mut rx).await;
    assert!(manager.is_empty());
    assert_eq!(proxy.notifier().subscriber_count(), 0);
}

#[tokio::test]
async fn test_add_remove_round_trip() {
    let connector = ScriptedConnector::new();
    let manager = CloudProviderManager::new(connector.clone());
    let (_id, mut rx) = manager.subscribe_channel();

    assert!(manager.apply(DiscoveryEvent::Appeared(common::endpoint(1))));
    assert!(!manager.apply(DiscoveryEvent::Appeared(common::endpoint(1))));
    assert!(manager.apply(DiscoveryEvent::Vanished(common::endpoint(1))));
    assert!(!manager.apply(DiscoveryEvent::Vanished(common::endpoint(1))));

    let events = common::next_events(&mut rx, 2).await;
    assert_eq!(
        events,
        vec![
            ChangeEvent::ProviderAdded(common::endpoint(1)),
            ChangeEvent::ProviderRemoved(common::endpoint(1)),
        ]
    );
    common::assert_quiet(&mut rx).await;
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_changed_hint_refreshes_all() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let manager = CloudProviderManager::new(connector.clone());
    let (_id, mut rx) = manager.subscribe_channel();

    manager.add_endpoint(common::endpoint(1));
    handle.answer("MyCloud", 1).await;
    common::next_events(&mut rx, 3).await;

    manager.provider_changed_hint();
    handle.answer("MyCloud", 3).await;

    let events = common::next_events(&mut rx, 2).await;
    let mut queries: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChangeEvent::ProviderUpdated { query, .. } => Some(*query),
            _ => None,
        })
        .collect();
    queries.sort_by_key(|q| *q == QueryKind::Status);
    assert_eq!(queries, vec![QueryKind::Name, QueryKind::Status]);
    assert_eq!(
        manager.provider(&common::endpoint(1)).unwrap().status(),
        ProviderStatus::Error
    );
}

#[tokio::test]
async fn test_hint_burst_is_coalesced() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let manager = CloudProviderManager::new(connector.clone());
    manager.add_endpoint(common::endpoint(1));

    let name = handle.next_name_call().await;
    let status = handle.next_status_call().await;
    for _ in 0..10 {
        manager.provider_changed_hint();
    }
    name.reply(Ok("MyCloud".to_string()));
    status.reply(Ok(1));

    handle.answer("MyCloud", 2).await;
    handle.assert_no_more_calls().await;
    assert_eq!(handle.name_calls(), 2);
    assert_eq!(handle.status_calls(), 2);
    assert_eq!(
        manager.provider(&common::endpoint(1)).unwrap().status(),
        ProviderStatus::Syncing
    );
}

#[tokio::test]
async fn test_sync_endpoints_keeps_live_proxies() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let manager = CloudProviderManager::new(connector.clone());

    let summary = manager.sync_endpoints([common::endpoint(1), common::endpoint(2)]);
    assert_eq!(summary, SyncSummary { added: 2, removed: 0 });
    handle.answer("MyCloud", 1).await;
    common::wait_until(|| {
        manager
            .provider(&common::endpoint(1))
            .is_some_and(|p| p.status() == ProviderStatus::Idle)
    })
    .await;

    let summary = manager.sync_endpoints([common::endpoint(1)]);
    assert_eq!(summary, SyncSummary { added: 0, removed: 1 });

    // the surviving proxy was not recreated
    let proxy = manager.provider(&common::endpoint(1)).unwrap();
    assert_eq!(proxy.name().as_deref(), Some("MyCloud"));
    assert_eq!(connector.attempts(), 2);
}
