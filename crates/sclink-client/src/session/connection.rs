//! Connection manager.
//!
//! Owns the live channel, the correlation table and the subscription
//! registry of one sc-server connection:
//! - connect / disconnect and the state machine
//! - `send`: id allocation, payload guard, send-with-retry, wait for the answer
//! - teardown when the dispatch loop reports a lost channel
//!
//! Every link transition happens under one `tokio::sync::Mutex<Link>`, so the
//! channel swap on reconnect is never observed half-done by `send` or by the
//! dispatch loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::Mutex;

use sclink_core::error::{Result, ScError};
use sclink_core::protocol::{encode_request, RequestType, Response};

use crate::config::ConnectionSettings;
use crate::dispatch;
use crate::obs::ClientMetrics;
use crate::session::correlation::{CorrelationTable, PendingSlot};
use crate::session::hooks::Hooks;
use crate::session::retry::{self, ReconnectOutcome};
use crate::session::subscriptions::{Subscription, SubscriptionRegistry};
use crate::transport::{Connector, FrameSink, TransportError, WsConnector};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

pub(crate) enum LinkStatus {
    /// No channel: never connected, or the last explicit connect was refused.
    Idle,
    Live(Box<dyn FrameSink>),
    /// Closed by the caller.
    Closed,
    /// Dropped by the peer or the network.
    Lost,
}

pub(crate) struct Link {
    pub(crate) url: Option<String>,
    /// Bumped on every successful open (connect and reconnect).
    pub(crate) generation: u64,
    /// Bumped on every explicit `connect`; request ids are only unique within one epoch.
    pub(crate) epoch: u64,
    pub(crate) status: LinkStatus,
}

pub(crate) struct Inner {
    pub(crate) settings: ConnectionSettings,
    pub(crate) connector: Arc<dyn Connector>,
    hooks: RwLock<Hooks>,
    pub(crate) link: Mutex<Link>,
    state: AtomicU8,
    pub(crate) pending: CorrelationTable,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) metrics: ClientMetrics,
}

impl Inner {
    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn hooks(&self) -> Hooks {
        // Poisoned lock means a hook setter panicked; fall back to no-ops.
        self.hooks.read().map(|h| h.clone()).unwrap_or_default()
    }

    /// Called by the dispatch loop once the frame stream of `generation` ended.
    pub(crate) async fn channel_ended(&self, generation: u64, reason: Option<TransportError>) {
        let mut link = self.link.lock().await;
        if link.generation != generation || matches!(link.status, LinkStatus::Closed | LinkStatus::Idle) {
            tracing::debug!(generation, "channel closed");
            return;
        }

        link.status = LinkStatus::Lost;
        self.set_state(ConnectionState::Disconnected);
        drop(link);

        let err = ScError::ConnectionLost;
        let failed = self.pending.fail_up_to(generation, &err);
        match reason {
            Some(reason) => tracing::error!(generation, failed, %reason, "connection to sc-server lost"),
            None => tracing::error!(generation, failed, "connection to sc-server lost"),
        }
        self.hooks().error(&err);
    }

    fn fail_send(&self, err: ScError) -> ScError {
        self.metrics.send_failures.inc(&[("kind", err.kind().as_str())]);
        self.hooks().error(&err);
        err
    }
}

/// Handle to one sc-server connection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// WebSocket connection with the given settings.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_connector(settings, Arc::new(WsConnector::new()))
    }

    /// Connection over a custom transport.
    pub fn with_connector(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                connector,
                hooks: RwLock::new(Hooks::default()),
                link: Mutex::new(Link {
                    url: None,
                    generation: 0,
                    epoch: 0,
                    status: LinkStatus::Idle,
                }),
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                pending: CorrelationTable::new(),
                subscriptions: SubscriptionRegistry::new(),
                metrics: ClientMetrics::default(),
            }),
        }
    }

    /// Handle that does not keep the connection alive.
    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    pub fn set_hooks(&self, hooks: Hooks) {
        if let Ok(mut h) = self.inner.hooks.write() {
            *h = hooks;
        }
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of requests waiting for an answer.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Open the channel. Resets request numbering and clears both tables.
    pub async fn connect(&self, url: &str) -> Result<()> {
        let inner = &self.inner;
        let mut link = inner.link.lock().await;

        if matches!(link.status, LinkStatus::Live(_)) {
            if let LinkStatus::Live(mut old) = std::mem::replace(&mut link.status, LinkStatus::Closed) {
                tracing::info!(generation = link.generation, "closing previous channel before connect");
                if let Err(e) = old.close().await {
                    tracing::debug!(error = %e, "previous channel close failed");
                }
            }
        }
        inner.pending.fail_all(&ScError::ConnectionLost);

        inner.set_state(ConnectionState::Connecting);
        link.url = Some(url.to_string());
        link.epoch += 1;

        match inner.connector.connect(url).await {
            Ok(channel) => {
                link.generation += 1;
                let generation = link.generation;

                inner.pending.reset();
                inner.subscriptions.clear();

                link.status = LinkStatus::Live(channel.sink);
                inner.set_state(ConnectionState::Connected);
                dispatch::spawn_inbound_loop(Arc::downgrade(inner), channel.frames, generation);
                drop(link);

                tracing::info!(%url, generation, "connection open");
                inner.hooks().opened();
                Ok(())
            }
            Err(e) => {
                link.status = LinkStatus::Idle;
                inner.set_state(ConnectionState::Disconnected);
                drop(link);

                tracing::error!(%url, error = %e, "cannot connect to sc-server");
                let err = ScError::ConnectionRefused(e.to_string());
                inner.hooks().error(&err);
                Err(err)
            }
        }
    }

    /// Close the channel. A no-op when nothing is open.
    pub async fn disconnect(&self) -> Result<()> {
        let inner = &self.inner;
        let mut link = inner.link.lock().await;

        match std::mem::replace(&mut link.status, LinkStatus::Closed) {
            LinkStatus::Live(mut sink) => {
                inner.set_state(ConnectionState::Disconnected);
                let generation = link.generation;
                if let Err(e) = sink.close().await {
                    tracing::debug!(error = %e, "channel close failed");
                }
                drop(link);

                let failed = inner.pending.fail_all(&ScError::ConnectionLost);
                tracing::info!(generation, failed, "connection closed");
                inner.hooks().closed();
            }
            LinkStatus::Idle => {
                link.status = LinkStatus::Idle;
                tracing::info!("connection was already closed");
            }
            LinkStatus::Closed | LinkStatus::Lost => {
                tracing::info!("connection was already closed");
            }
        }
        Ok(())
    }

    /// Send one request and wait for its response.
    ///
    /// Lost channels are recovered per the retry policy; the caller never
    /// sees a retry. Server-reported errors are returned inside the
    /// `Response`; use [`Connection::execute`] to turn them into `Err`.
    pub async fn send(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        let started = Instant::now();
        self.inner.metrics.requests.inc(&[("type", request_type.as_str())]);

        let res = self.send_with_retry(request_type, payload).await;
        match &res {
            Ok(_) => self
                .inner
                .metrics
                .round_trip
                .observe(&[("type", request_type.as_str())], started.elapsed()),
            Err(e) => tracing::debug!(%request_type, error = %e, "request failed"),
        }
        res
    }

    /// `send` plus server error extraction.
    pub async fn execute(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        let resp = self.send(request_type, payload).await?;
        resp.into_result(payload).map_err(|e| {
            tracing::error!(%request_type, error = %e, "sc-server rejected request");
            e
        })
    }

    async fn send_with_retry(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        let inner = &self.inner;
        let mut link = inner.link.lock().await;

        let epoch = link.epoch;
        let id = inner.pending.allocate();
        let text = encode_request(id, request_type, payload)?;
        let size = text.len();
        let max = inner.settings.max_payload_bytes;
        if size > max {
            drop(link);
            tracing::warn!(id, size, max, "payload too large");
            return Err(inner.fail_send(ScError::PayloadTooLarge { size, max }));
        }

        let mut retries_left = inner.settings.retries;
        loop {
            let refused = if link.epoch != epoch {
                // An explicit connect restarted numbering; this id is no longer ours.
                Some(ScError::ConnectionLost)
            } else {
                match link.status {
                    LinkStatus::Idle => Some(ScError::NotConnected),
                    LinkStatus::Closed => Some(ScError::AlreadyDisconnected),
                    LinkStatus::Lost | LinkStatus::Live(_) => None,
                }
            };
            if let Some(err) = refused {
                drop(link);
                return Err(inner.fail_send(err));
            }

            let generation = link.generation;
            let sent = match &mut link.status {
                LinkStatus::Live(sink) => {
                    let slot = inner.pending.register(id, generation);
                    Some(sink.send_text(text.clone()).await.map(|()| slot))
                }
                _ => None,
            };
            match sent {
                Some(Ok(slot)) => {
                    drop(link);
                    tracing::trace!(id, %request_type, "request sent");
                    return self.wait(slot).await;
                }
                Some(Err(e)) => {
                    inner.pending.forget(id);
                    tracing::warn!(id, generation, error = %e, "send failed, channel lost");
                    link.status = LinkStatus::Lost;
                    inner.set_state(ConnectionState::Disconnected);
                }
                None => {}
            }

            if retries_left == 0 {
                drop(link);
                tracing::error!(id, "sc-server takes a long time to respond");
                return Err(inner.fail_send(ScError::ServerTimeout));
            }
            retries_left -= 1;
            drop(link);

            let delay = inner.settings.retry_delay;
            tracing::warn!(?delay, retries_left, "trying to reconnect");
            tokio::time::sleep(delay).await;
            inner.hooks().reconnecting();

            link = inner.link.lock().await;
            if link.epoch != epoch || matches!(link.status, LinkStatus::Closed) {
                continue;
            }
            let outcome = retry::reconnect(inner, &mut link, generation).await;
            drop(link);
            match outcome {
                ReconnectOutcome::Opened => {
                    inner.metrics.reconnect_attempts.inc(&[("outcome", "ok")]);
                    let hooks = inner.hooks();
                    hooks.opened();
                    hooks.reconnected();
                }
                ReconnectOutcome::Shared => {
                    inner.metrics.reconnect_attempts.inc(&[("outcome", "shared")]);
                }
                ReconnectOutcome::Failed(e) => {
                    inner.metrics.reconnect_attempts.inc(&[("outcome", "failed")]);
                    tracing::warn!(error = %e, retries_left, "reconnect failed");
                }
            }
            link = inner.link.lock().await;
        }
    }

    async fn wait(&self, slot: PendingSlot) -> Result<Response> {
        match slot.await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(self.inner.fail_send(e)),
            Err(_) => Err(self.inner.fail_send(ScError::ConnectionLost)),
        }
    }

    /// Track a subscription the server acknowledged.
    pub fn register_subscription(&self, sub: Subscription) {
        tracing::debug!(id = sub.id, event_type = sub.event_type.as_str(), "subscription registered");
        self.inner.subscriptions.put(sub);
    }

    /// Forget a subscription the server destroyed.
    pub fn drop_subscription(&self, id: u64) -> Option<Subscription> {
        self.inner.subscriptions.remove(id)
    }

    pub fn subscription(&self, id: u64) -> Option<Subscription> {
        self.inner.subscriptions.get(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }
}

/// Non-owning [`Connection`] handle, for callbacks stored inside the connection itself.
#[derive(Clone)]
pub struct WeakConnection {
    inner: Weak<Inner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}
