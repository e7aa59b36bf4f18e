//! Shared test helpers
//!
//! [`ScriptedChannel`] parks every `GetName` / `GetStatus` call until the
//! test answers it through the matching [`ChannelHandle`].
//! [`ScriptedConnector`] maps endpoints to a connect outcome.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use cloudprov_core::{
    domain::ProviderEndpoint,
    ports::{IProviderChannel, IProviderConnector, TransportError},
};
use cloudprov_manager::ChangeEvent;
use tokio::sync::{mpsc, oneshot};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(50);

pub fn endpoint(n: u32) -> ProviderEndpoint {
    ProviderEndpoint::new(format!("org.example.Cloud{n}"), format!("/org/example/Cloud{n}"))
        .expect("valid endpoint")
}

// ============================================================================
// Scripted channel
// ============================================================================

/// A call waiting for the test to reply
pub struct PendingCall<T> {
    reply: oneshot::Sender<Result<T, TransportError>>,
}

impl<T> PendingCall<T> {
    pub fn reply(self, result: Result<T, TransportError>) {
        let _ = self.reply.send(result);
    }
}

pub struct ScriptedChannel {
    name_tx: mpsc::UnboundedSender<PendingCall<String>>,
    status_tx: mpsc::UnboundedSender<PendingCall<i32>>,
    name_count: AtomicUsize,
    status_count: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new() -> (Arc<Self>, ChannelHandle) {
        let (name_tx, name_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            name_tx,
            status_tx,
            name_count: AtomicUsize::new(0),
            status_count: AtomicUsize::new(0),
        });
        let handle = ChannelHandle {
            channel: Arc::clone(&channel),
            name_rx,
            status_rx,
        };
        (channel, handle)
    }
}

#[async_trait::async_trait]
impl IProviderChannel for ScriptedChannel {
    async fn get_name(&self) -> Result<String, TransportError> {
        self.name_count.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        let _ = self.name_tx.send(PendingCall { reply });
        rx.await
            .unwrap_or_else(|_| Err(TransportError::call("GetName", "call abandoned")))
    }

    async fn get_status(&self) -> Result<i32, TransportError> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        let _ = self.status_tx.send(PendingCall { reply });
        rx.await
            .unwrap_or_else(|_| Err(TransportError::call("GetStatus", "call abandoned")))
    }
}

/// Test side of a [`ScriptedChannel`]
pub struct ChannelHandle {
    channel: Arc<ScriptedChannel>,
    name_rx: mpsc::UnboundedReceiver<PendingCall<String>>,
    status_rx: mpsc::UnboundedReceiver<PendingCall<i32>>,
}

impl ChannelHandle {
    pub async fn next_name_call(&mut self) -> PendingCall<String> {
        tokio::time::timeout(WAIT, self.name_rx.recv())
            .await
            .expect("timed out waiting for GetName")
            .expect("channel dropped")
    }

    pub async fn next_status_call(&mut self) -> PendingCall<i32> {
        tokio::time::timeout(WAIT, self.status_rx.recv())
            .await
            .expect("timed out waiting for GetStatus")
            .expect("channel dropped")
    }

    pub async fn answer_name(&mut self, result: Result<String, TransportError>) {
        self.next_name_call().await.reply(result);
    }

    pub async fn answer_status(&mut self, result: Result<i32, TransportError>) {
        self.next_status_call().await.reply(result);
    }

    /// Answers one pending call of each kind
    pub async fn answer(&mut self, name: &str, status: i32) {
        self.answer_name(Ok(name.to_string())).await;
        self.answer_status(Ok(status)).await;
    }

    /// Asserts no further call arrives within a short quiet period
    pub async fn assert_no_more_calls(&mut self) {
        tokio::time::sleep(QUIET).await;
        assert!(self.name_rx.try_recv().is_err(), "unexpected GetName");
        assert!(self.status_rx.try_recv().is_err(), "unexpected GetStatus");
    }

    pub fn name_calls(&self) -> usize {
        self.channel.name_count.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.channel.status_count.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Scripted connector
// ============================================================================

#[derive(Clone)]
pub enum ConnectOutcome {
    Ready(Arc<ScriptedChannel>),
    Fail(String),
    /// Never completes
    Pending,
}

/// Connector with a per-endpoint outcome; unknown endpoints never connect
#[derive(Default)]
pub struct ScriptedConnector {
    outcomes: Mutex<HashMap<ProviderEndpoint, ConnectOutcome>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, endpoint: ProviderEndpoint, outcome: ConnectOutcome) {
        self.outcomes.lock().unwrap().insert(endpoint, outcome);
    }

    /// Registers a ready channel for `endpoint` and returns its handle
    pub fn ready(&self, endpoint: ProviderEndpoint) -> ChannelHandle {
        let (channel, handle) = ScriptedChannel::new();
        self.set(endpoint, ConnectOutcome::Ready(channel));
        handle
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IProviderConnector for ScriptedConnector {
    async fn connect(
        &self,
        endpoint: &ProviderEndpoint,
    ) -> Result<Arc<dyn IProviderChannel>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or(ConnectOutcome::Pending);

        match outcome {
            ConnectOutcome::Ready(channel) => Ok(channel as Arc<dyn IProviderChannel>),
            ConnectOutcome::Fail(message) => Err(TransportError::connect(endpoint, message)),
            ConnectOutcome::Pending => std::future::pending().await,
        }
    }
}

// ============================================================================
// Event helpers
// ============================================================================

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChangeEvent>) -> ChangeEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for change event")
        .expect("notifier closed")
}

pub async fn next_events(
    rx: &mut mpsc::UnboundedReceiver<ChangeEvent>,
    count: usize,
) -> Vec<ChangeEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(next_event(rx).await);
    }
    events
}

/// Asserts nothing more is delivered within a short quiet period
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<ChangeEvent>) {
    tokio::time::sleep(QUIET).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected change event: {event:?}");
    }
}

/// Polls `condition` until it holds or the wait expires
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
