//! ProviderProxy behavior against a scripted channel

use cloudprov_core::{domain::ProviderStatus, ports::TransportError};
use cloudprov_manager::{ChangeEvent, ConnectionPhase, ProviderProxy, QueryKind};

use crate::common::{self, ConnectOutcome, ScriptedConnector};

fn updated(n: u32, query: QueryKind) -> ChangeEvent {
    ChangeEvent::ProviderUpdated {
        endpoint: common::endpoint(n),
        query,
    }
}

#[tokio::test]
async fn test_initial_refresh_populates_cache() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));

    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());

    handle.answer_name(Ok("MyCloud".to_string())).await;
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Name));
    assert_eq!(proxy.name().as_deref(), Some("MyCloud"));
    assert_eq!(proxy.status(), ProviderStatus::Invalid);

    handle.answer_status(Ok(2)).await;
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Status));
    assert_eq!(proxy.status(), ProviderStatus::Syncing);
    assert_eq!(proxy.phase(), ConnectionPhase::Ready);
}

#[tokio::test]
async fn test_replies_in_reverse_order_populate_cache() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));

    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());

    handle.answer_status(Ok(1)).await;
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Status));
    assert_eq!(proxy.status(), ProviderStatus::Idle);
    assert!(proxy.name().is_none());

    handle.answer_name(Ok("MyCloud".to_string())).await;
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Name));
    assert_eq!(proxy.name().as_deref(), Some("MyCloud"));
    assert_eq!(proxy.status(), ProviderStatus::Idle);
    common::assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_status_error_keeps_previous_value() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());

    handle.answer("MyCloud", 1).await;
    common::next_events(&mut rx, 2).await;
    assert_eq!(proxy.status(), ProviderStatus::Idle);

    proxy.refresh();
    handle
        .answer_status(Err(TransportError::call("GetStatus", "timeout")))
        .await;

    // exactly one notification for the failed query
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Status));
    common::assert_quiet(&mut rx).await;
    assert_eq!(proxy.status(), ProviderStatus::Idle);
    assert_eq!(proxy.name().as_deref(), Some("MyCloud"));
}

#[tokio::test]
async fn test_never_connected_proxy_stays_unset() {
    let connector = ScriptedConnector::new();
    let proxy = ProviderProxy::create(common::endpoint(1), connector.clone());
    let (_id, mut rx) = proxy.notifier().subscribe_channel();

    common::wait_until(|| connector.attempts() == 1).await;
    proxy.refresh();
    proxy.refresh();

    common::assert_quiet(&mut rx).await;
    assert_eq!(proxy.phase(), ConnectionPhase::Connecting);
    assert!(proxy.name().is_none());
    assert_eq!(proxy.status(), ProviderStatus::Invalid);
}

#[tokio::test]
async fn test_connect_failure_is_not_retried() {
    let connector = ScriptedConnector::new();
    connector.set(
        common::endpoint(1),
        ConnectOutcome::Fail("name has no owner".to_string()),
    );
    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());
    proxy.connect(connector.clone());

    common::wait_until(|| connector.attempts() == 1).await;
    proxy.refresh();

    common::assert_quiet(&mut rx).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(proxy.phase(), ConnectionPhase::Connecting);
}

#[tokio::test]
async fn test_overlapping_refreshes_coalesce() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());

    // initial GetName is parked; pile refreshes on top of it
    let first = handle.next_name_call().await;
    assert!(proxy.is_busy());
    proxy.refresh();
    proxy.refresh();
    proxy.refresh();

    first.reply(Ok("Stale".to_string()));
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Name));

    // one re-issue, answered with the fresh value
    handle.answer_name(Ok("Fresh".to_string())).await;
    assert_eq!(common::next_event(&mut rx).await, updated(1, QueryKind::Name));
    assert_eq!(proxy.name().as_deref(), Some("Fresh"));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(handle.name_calls(), 2);
    assert_eq!(handle.status_calls(), 1);
}

#[tokio::test]
async fn test_unknown_status_is_invalid() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let proxy = ProviderProxy::new(common::endpoint(1));
    let (_id, mut rx) = proxy.notifier().subscribe_channel();
    proxy.connect(connector.clone());

    handle.answer("MyCloud", 2).await;
    common::next_events(&mut rx, 2).await;
    assert_eq!(proxy.status(), ProviderStatus::Syncing);

    proxy.refresh();
    handle.answer("MyCloud", 42).await;
    common::next_events(&mut rx, 2).await;
    assert_eq!(proxy.status(), ProviderStatus::Invalid);
}

#[tokio::test]
async fn test_dropped_proxy_discards_late_replies() {
    let connector = ScriptedConnector::new();
    let mut handle = connector.ready(common::endpoint(1));
    let proxy = ProviderProxy::new(common::endpoint(1));
    let notifier = proxy.notifier().clone();
    let (_id, mut rx) = notifier.subscribe_channel();
    proxy.connect(connector.clone());

    let pending = handle.next_name_call().await;
    drop(proxy);
    pending.reply(Ok("Late".to_string()));

    common::assert_quiet(&mut rx).await;
}
