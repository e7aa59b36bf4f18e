//! Provider proxy
//!
//! A [`ProviderProxy`] tracks one remote provider endpoint. It establishes a
//! channel through an [`IProviderConnector`] in the background, then issues
//! `GetName` / `GetStatus` on every [`refresh`](ProviderProxy::refresh) and
//! caches the replies.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──connect()──→ Connecting ──channel ready──→ Ready ──refresh()──→ Ready
//!                          │
//!                          └── connect error: logged, stays Connecting
//! ```
//!
//! Every completed query (successful or not) raises
//! [`ChangeEvent::ProviderUpdated`] on the proxy's notifier. A failed query
//! leaves the cached value untouched.
//!
//! ## In-flight guard
//!
//! At most one request of each kind is outstanding. A refresh that arrives
//! while a request is in flight marks it dirty; the request is issued once
//! more after the current reply lands, so the cached value always reflects
//! a reply sent after the latest refresh.
//!
//! Background tasks hold a weak reference to the proxy. Dropping every
//! `ProviderProxy` handle discards pending replies.

use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use cloudprov_core::{
    domain::{IconHandle, MenuHandle, ProviderEndpoint, ProviderState, ProviderStatus},
    ports::{IProviderChannel, IProviderConnector, TransportError},
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::notifier::{ChangeEvent, ChangeNotifier, QueryKind, SubscriptionId};

/// Connection phase of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Channel not established (yet, or ever after a failure)
    Connecting,
    /// Channel established; refreshes issue queries
    Ready,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Ready => write!(f, "ready"),
        }
    }
}

const GUARD_IDLE: u8 = 0;
const GUARD_IN_FLIGHT: u8 = 1;
const GUARD_DIRTY: u8 = 2;

/// Per-query-kind in-flight state
#[derive(Debug, Default)]
struct QueryGuard(AtomicU8);

impl QueryGuard {
    /// Claims the slot. Returns `false` if a request is already
    /// outstanding; that request is then marked dirty.
    fn try_begin(&self) -> bool {
        loop {
            match self.0.load(Ordering::Acquire) {
                GUARD_IDLE => {
                    if self
                        .0
                        .compare_exchange(
                            GUARD_IDLE,
                            GUARD_IN_FLIGHT,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return true;
                    }
                }
                GUARD_IN_FLIGHT => {
                    if self
                        .0
                        .compare_exchange(
                            GUARD_IN_FLIGHT,
                            GUARD_DIRTY,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return false;
                    }
                }
                // already dirty: the pending re-issue covers this refresh
                _ => return false,
            }
        }
    }

    /// Releases the slot after a reply. Returns `true` if the request must
    /// be issued again; the slot then stays claimed.
    fn finish(&self) -> bool {
        loop {
            if self.0.load(Ordering::Acquire) == GUARD_IDLE {
                return false;
            }
            if self
                .0
                .compare_exchange(
                    GUARD_DIRTY,
                    GUARD_IN_FLIGHT,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return true;
            }
            if self
                .0
                .compare_exchange(
                    GUARD_IN_FLIGHT,
                    GUARD_IDLE,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return false;
            }
        }
    }

    fn is_in_flight(&self) -> bool {
        self.0.load(Ordering::Acquire) != GUARD_IDLE
    }
}

struct ProxyInner {
    endpoint: ProviderEndpoint,
    state: RwLock<ProviderState>,
    channel: OnceLock<Arc<dyn IProviderChannel>>,
    connect_started: AtomicBool,
    name_query: QueryGuard,
    status_query: QueryGuard,
    notifier: ChangeNotifier,
}

impl ProxyInner {
    fn read_state(&self) -> RwLockReadGuard<'_, ProviderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ProviderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self, kind: QueryKind) -> &QueryGuard {
        match kind {
            QueryKind::Name => &self.name_query,
            QueryKind::Status => &self.status_query,
        }
    }

    fn apply_name(&self, result: Result<String, TransportError>) {
        match result {
            Ok(name) => {
                debug!(endpoint = %self.endpoint, name = %name, "Provider name updated");
                self.write_state().name = Some(name);
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Error getting the provider name");
            }
        }
        self.emit_updated(QueryKind::Name);
    }

    fn apply_status(&self, result: Result<i32, TransportError>) {
        match result {
            Ok(raw) => {
                let status = ProviderStatus::from_wire(raw).unwrap_or_else(|e| {
                    warn!(endpoint = %self.endpoint, error = %e, "Provider sent an unknown status");
                    ProviderStatus::Invalid
                });
                debug!(endpoint = %self.endpoint, status = %status, "Provider status updated");
                self.write_state().status = status;
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Error getting the provider status");
            }
        }
        self.emit_updated(QueryKind::Status);
    }

    fn emit_updated(&self, query: QueryKind) {
        self.notifier.emit(&ChangeEvent::ProviderUpdated {
            endpoint: self.endpoint.clone(),
            query,
        });
    }
}

/// Cached view of one remote cloud provider
///
/// Cheap to clone; clones share state and notifier. Methods that start
/// background work (`connect`, `refresh`) must run inside a tokio runtime.
#[derive(Clone)]
pub struct ProviderProxy {
    inner: Arc<ProxyInner>,
}

impl ProviderProxy {
    /// Creates an unconnected proxy
    ///
    /// Subscribe first, then call [`connect`](Self::connect), so no event
    /// can be missed.
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                endpoint,
                state: RwLock::new(ProviderState::default()),
                channel: OnceLock::new(),
                connect_started: AtomicBool::new(false),
                name_query: QueryGuard::default(),
                status_query: QueryGuard::default(),
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    /// Creates a proxy and starts connecting right away
    pub fn create(endpoint: ProviderEndpoint, connector: Arc<dyn IProviderConnector>) -> Self {
        let proxy = Self::new(endpoint);
        proxy.connect(connector);
        proxy
    }

    /// Starts establishing the channel in the background
    ///
    /// On success the proxy becomes [`ConnectionPhase::Ready`] and refreshes
    /// immediately. On failure the error is logged and the proxy stays
    /// [`ConnectionPhase::Connecting`]; there is no retry. Calling this more
    /// than once has no effect.
    pub fn connect(&self, connector: Arc<dyn IProviderConnector>) {
        if self.inner.connect_started.swap(true, Ordering::AcqRel) {
            debug!(endpoint = %self.inner.endpoint, "Connect already started");
            return;
        }

        let endpoint = self.inner.endpoint.clone();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            debug!(endpoint = %endpoint, "Connecting to cloud provider");
            let result = connector.connect(&endpoint).await;

            let Some(inner) = weak.upgrade() else {
                debug!(endpoint = %endpoint, "Proxy dropped before channel was ready");
                return;
            };

            match result {
                Ok(channel) => {
                    if inner.channel.set(channel).is_err() {
                        return;
                    }
                    info!(endpoint = %endpoint, "Cloud provider channel ready");
                    ProviderProxy { inner }.refresh();
                }
                Err(e) => {
                    warn!(
                        endpoint = %endpoint,
                        error = %e,
                        "Error creating proxy for cloud provider"
                    );
                }
            }
        });
    }

    /// Re-queries name and status
    ///
    /// Silently does nothing until the channel is ready. The two queries run
    /// independently and may complete in either order.
    pub fn refresh(&self) {
        let Some(channel) = self.inner.channel.get() else {
            debug!(endpoint = %self.inner.endpoint, "Refresh skipped, channel not ready");
            return;
        };

        for kind in [QueryKind::Name, QueryKind::Status] {
            self.issue(kind, Arc::clone(channel));
        }
    }

    fn issue(&self, kind: QueryKind, channel: Arc<dyn IProviderChannel>) {
        if !self.inner.guard(kind).try_begin() {
            debug!(
                endpoint = %self.inner.endpoint,
                query = %kind,
                "Query already in flight, will re-issue after reply"
            );
            return;
        }

        let weak: Weak<ProxyInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match kind {
                    QueryKind::Name => {
                        let result = channel.get_name().await;
                        let Some(inner) = weak.upgrade() else { return };
                        inner.apply_name(result);
                    }
                    QueryKind::Status => {
                        let result = channel.get_status().await;
                        let Some(inner) = weak.upgrade() else { return };
                        inner.apply_status(result);
                    }
                }

                let Some(inner) = weak.upgrade() else { return };
                if !inner.guard(kind).finish() {
                    break;
                }
            }
        });
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.inner.endpoint
    }

    /// Last successfully reported name
    pub fn name(&self) -> Option<String> {
        self.inner.read_state().name.clone()
    }

    /// Last successfully reported status, `Invalid` until the first reply
    pub fn status(&self) -> ProviderStatus {
        self.inner.read_state().status
    }

    /// Always `None` with the two-method protocol
    pub fn icon(&self) -> Option<IconHandle> {
        self.inner.read_state().icon.clone()
    }

    /// Always `None` with the two-method protocol
    pub fn menu(&self) -> Option<MenuHandle> {
        self.inner.read_state().menu.clone()
    }

    /// Snapshot of every cached field
    pub fn state(&self) -> ProviderState {
        self.inner.read_state().clone()
    }

    pub fn phase(&self) -> ConnectionPhase {
        if self.inner.channel.get().is_some() {
            ConnectionPhase::Ready
        } else {
            ConnectionPhase::Connecting
        }
    }

    /// Whether any query is currently outstanding
    pub fn is_busy(&self) -> bool {
        self.inner.name_query.is_in_flight() || self.inner.status_query.is_in_flight()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    /// Shorthand for `self.notifier().subscribe(callback)`
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(callback)
    }

    /// Whether two handles refer to the same proxy
    pub fn ptr_eq(&self, other: &ProviderProxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ProviderProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProxy")
            .field("endpoint", &self.inner.endpoint)
            .field("phase", &self.phase())
            .field("state", &*self.inner.read_state())
            .finish()
    }
}
