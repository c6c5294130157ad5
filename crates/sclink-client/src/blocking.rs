//! Blocking facade.
//!
//! Owns a multi-thread runtime that drives the dispatch loop; each call parks
//! the caller's thread on the async operation. Must not be called from inside
//! an async context.
//!
//! A `Thread` callback registered on a client must not capture a clone of
//! that client: the registry would own the runtime that owns the registry,
//! and the worker threads would never stop. Capture [`BlockingClient::downgrade`]
//! instead.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use sclink_core::error::{Result, ScError};
use sclink_core::protocol::{RequestType, Response, ScAddr};

use crate::client::{KeynodeParams, ScClient, SubscriptionParams};
use crate::config::{ClientConfig, ConnectionSettings};
use crate::session::{Connection, ConnectionState, Hooks, Subscription, WeakConnection};
use crate::transport::Connector;

#[derive(Clone)]
pub struct BlockingClient {
    rt: Arc<Runtime>,
    inner: ScClient,
}

impl BlockingClient {
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        Ok(Self {
            rt: Arc::new(session_runtime()?),
            inner: ScClient::new(settings),
        })
    }

    pub fn with_connector(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Result<Self> {
        Ok(Self {
            rt: Arc::new(session_runtime()?),
            inner: ScClient::from_connection(Connection::with_connector(settings, connector)),
        })
    }

    /// Build from a validated config and connect to its url.
    pub fn connect_with(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::new(config.settings()?)?;
        client.connect(&config.url)?;
        Ok(client)
    }

    /// Handle for callbacks; does not keep the runtime or the connection alive.
    pub fn downgrade(&self) -> WeakBlockingClient {
        WeakBlockingClient {
            rt: Arc::downgrade(&self.rt),
            conn: self.inner.connection().downgrade(),
        }
    }

    /// The async client this one drives.
    pub fn as_async(&self) -> &ScClient {
        &self.inner
    }

    pub fn connect(&self, url: &str) -> Result<()> {
        self.rt.block_on(self.inner.connect(url))
    }

    pub fn disconnect(&self) -> Result<()> {
        self.rt.block_on(self.inner.disconnect())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn set_hooks(&self, hooks: Hooks) {
        self.inner.set_hooks(hooks);
    }

    pub fn send(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        self.rt.block_on(self.inner.send(request_type, payload))
    }

    pub fn execute(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        self.rt.block_on(self.inner.execute(request_type, payload))
    }

    pub fn check_elements(&self, addrs: &[ScAddr]) -> Result<Vec<u64>> {
        self.rt.block_on(self.inner.check_elements(addrs))
    }

    pub fn delete_elements(&self, addrs: &[ScAddr]) -> Result<bool> {
        self.rt.block_on(self.inner.delete_elements(addrs))
    }

    pub fn resolve_keynodes(&self, params: &[KeynodeParams]) -> Result<Vec<ScAddr>> {
        self.rt.block_on(self.inner.resolve_keynodes(params))
    }

    pub fn create_event_subscriptions(&self, params: Vec<SubscriptionParams>) -> Result<Vec<Subscription>> {
        self.rt.block_on(self.inner.create_event_subscriptions(params))
    }

    pub fn destroy_event_subscriptions(&self, ids: &[u64]) -> Result<bool> {
        self.rt.block_on(self.inner.destroy_event_subscriptions(ids))
    }

    pub fn is_subscription_valid(&self, id: u64) -> bool {
        self.inner.is_subscription_valid(id)
    }
}

/// Non-owning [`BlockingClient`] handle.
#[derive(Clone)]
pub struct WeakBlockingClient {
    rt: Weak<Runtime>,
    conn: WeakConnection,
}

impl WeakBlockingClient {
    /// `None` once the client was dropped.
    pub fn upgrade(&self) -> Option<BlockingClient> {
        let rt = self.rt.upgrade()?;
        let conn = self.conn.upgrade()?;
        Some(BlockingClient {
            rt,
            inner: ScClient::from_connection(conn),
        })
    }
}

fn session_runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("sc-client-session")
        .enable_all()
        .build()
        .map_err(|e| ScError::Internal(format!("cannot start client runtime: {e}")))
}
