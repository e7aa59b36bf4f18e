//! Change notification
//!
//! [`ChangeNotifier`] is a small observer list shared by proxies and the
//! manager. Events are delivered synchronously, in subscription order, on
//! whichever task calls [`ChangeNotifier::emit`]. Async consumers can use
//! [`ChangeNotifier::subscribe_channel`] to receive the same events through
//! an unbounded mpsc channel.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use cloudprov_core::domain::ProviderEndpoint;
use tokio::sync::mpsc;
use tracing::trace;

/// Which provider query produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// `GetName`
    Name,
    /// `GetStatus`
    Status,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Name => write!(f, "GetName"),
            QueryKind::Status => write!(f, "GetStatus"),
        }
    }
}

/// A change raised by a proxy or by the manager
///
/// `ProviderUpdated` is raised whenever a query completes, whether it
/// succeeded or not. Consumers re-read the proxy accessors to learn the
/// current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A query on this provider completed
    ProviderUpdated {
        endpoint: ProviderEndpoint,
        query: QueryKind,
    },
    /// The manager started tracking this provider
    ProviderAdded(ProviderEndpoint),
    /// The manager stopped tracking this provider
    ProviderRemoved(ProviderEndpoint),
}

impl ChangeEvent {
    /// Endpoint the event is about
    pub fn endpoint(&self) -> &ProviderEndpoint {
        match self {
            ChangeEvent::ProviderUpdated { endpoint, .. } => endpoint,
            ChangeEvent::ProviderAdded(endpoint) => endpoint,
            ChangeEvent::ProviderRemoved(endpoint) => endpoint,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

/// Cloneable observer list; clones share the same subscribers
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every future event
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers().push((id, Arc::new(callback)));
        id
    }

    /// Registers a channel subscriber
    ///
    /// The returned receiver yields every event emitted after this call.
    /// Events sent after the receiver is dropped are discarded.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                trace!("Change event receiver dropped");
            }
        });
        (id, rx)
    }

    /// Removes a subscriber. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Delivers `event` to every subscriber
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe,
    /// unsubscribe or emit on this notifier without deadlocking.
    pub fn emit(&self, event: &ChangeEvent) {
        let callbacks: Vec<Callback> = self
            .subscribers()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Callback)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
