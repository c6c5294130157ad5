//! Async facade over [`Connection`].
//!
//! Thin typed wrappers around `execute`. Payload shapes follow the sc-server
//! JSON protocol; anything needing the knowledge-base data model is left to
//! callers via [`ScClient::execute`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use sclink_core::error::{Result, ScError};
use sclink_core::protocol::{RequestType, Response, ScAddr, ScEventType};

use crate::config::{ClientConfig, ConnectionSettings};
use crate::session::{Connection, ConnectionState, EventCallback, Hooks, Subscription};

/// Keynode lookup. With an element type the server creates the keynode when
/// it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeynodeParams {
    pub idtf: String,
    pub el_type: Option<u64>,
}

impl KeynodeParams {
    pub fn find(idtf: impl Into<String>) -> Self {
        Self {
            idtf: idtf.into(),
            el_type: None,
        }
    }

    pub fn resolve(idtf: impl Into<String>, el_type: u64) -> Self {
        Self {
            idtf: idtf.into(),
            el_type: Some(el_type),
        }
    }

    fn to_payload(&self) -> Value {
        match self.el_type {
            Some(t) if t != 0 => json!({"command": "resolve", "idtf": self.idtf, "elType": t}),
            _ => json!({"command": "find", "idtf": self.idtf}),
        }
    }
}

/// One event subscription to create.
#[derive(Debug, Clone)]
pub struct SubscriptionParams {
    pub addr: ScAddr,
    pub event_type: ScEventType,
    pub callback: EventCallback,
}

impl SubscriptionParams {
    pub fn new(addr: ScAddr, event_type: ScEventType, callback: EventCallback) -> Self {
        Self {
            addr,
            event_type,
            callback,
        }
    }
}

#[derive(Clone)]
pub struct ScClient {
    conn: Connection,
}

impl ScClient {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            conn: Connection::new(settings),
        }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Build from a validated config and connect to its url.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::new(config.settings()?);
        client.connect(&config.url).await?;
        Ok(client)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn connect(&self, url: &str) -> Result<()> {
        self.conn.connect(url).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.conn.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn set_hooks(&self, hooks: Hooks) {
        self.conn.set_hooks(hooks);
    }

    pub async fn send(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        self.conn.send(request_type, payload).await
    }

    pub async fn execute(&self, request_type: RequestType, payload: &Value) -> Result<Response> {
        self.conn.execute(request_type, payload).await
    }

    /// Raw type values of the given elements (0 for missing ones).
    pub async fn check_elements(&self, addrs: &[ScAddr]) -> Result<Vec<u64>> {
        if addrs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = addr_values(addrs);
        let resp = self.execute(RequestType::CheckElements, &payload).await?;
        parse_payload(resp)
    }

    pub async fn delete_elements(&self, addrs: &[ScAddr]) -> Result<bool> {
        let payload = addr_values(addrs);
        let resp = self.execute(RequestType::DeleteElements, &payload).await?;
        Ok(resp.status)
    }

    pub async fn resolve_keynodes(&self, params: &[KeynodeParams]) -> Result<Vec<ScAddr>> {
        let payload = Value::Array(params.iter().map(KeynodeParams::to_payload).collect());
        let resp = self.execute(RequestType::Keynodes, &payload).await?;
        if resp.payload.is_null() {
            return Ok(Vec::new());
        }
        let values: Vec<u64> = parse_payload(resp)?;
        Ok(values.into_iter().map(ScAddr).collect())
    }

    /// Create server-side subscriptions and register their callbacks.
    pub async fn create_event_subscriptions(&self, params: Vec<SubscriptionParams>) -> Result<Vec<Subscription>> {
        let create: Vec<Value> = params
            .iter()
            .map(|p| json!({"type": p.event_type.as_str(), "addr": p.addr.value()}))
            .collect();
        let payload = json!({ "create": create });
        let resp = self.execute(RequestType::Events, &payload).await?;

        let ids: Vec<u64> = parse_payload(resp)?;
        if ids.len() < params.len() {
            return Err(ScError::BadFrame(format!(
                "expected {} subscription ids, got {}",
                params.len(),
                ids.len()
            )));
        }

        let subs: Vec<Subscription> = params
            .into_iter()
            .zip(ids)
            .map(|(p, id)| Subscription {
                id,
                event_type: p.event_type,
                addr: p.addr,
                callback: p.callback,
            })
            .collect();
        for sub in &subs {
            self.conn.register_subscription(sub.clone());
        }
        Ok(subs)
    }

    /// Destroy server-side subscriptions and forget them locally.
    pub async fn destroy_event_subscriptions(&self, ids: &[u64]) -> Result<bool> {
        let payload = json!({ "delete": ids });
        let resp = self.execute(RequestType::Events, &payload).await?;
        for id in ids {
            self.conn.drop_subscription(*id);
        }
        Ok(resp.status)
    }

    pub fn is_subscription_valid(&self, id: u64) -> bool {
        self.conn.subscription(id).is_some()
    }
}

fn addr_values(addrs: &[ScAddr]) -> Value {
    Value::Array(addrs.iter().map(|a| json!(a.value())).collect())
}

fn parse_payload<T: DeserializeOwned>(resp: Response) -> Result<T> {
    serde_json::from_value(resp.payload)
        .map_err(|e| ScError::BadFrame(format!("unexpected response payload: {e}")))
}
