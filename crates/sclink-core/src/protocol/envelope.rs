//! JSON envelopes exchanged with sc-server.
//!
//! Outbound: `{"id", "type", "payload"}`.
//! Inbound: `{"id", "status", "event", "payload", "errors"}`.
//!
//! Inbound frames are decoded header-first: `payload` is kept as a `RawValue`
//! until the `event` flag says whether it is an event triple or a response
//! body, so the two id spaces never get mixed up.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::{Result, ScError, ServerError};
use crate::protocol::types::{EventTriple, RequestType, ScAddr};

/// Outbound request (owned form, as seen by a server or a test stub).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize)]
struct RequestRef<'a> {
    id: u64,
    #[serde(rename = "type")]
    request_type: RequestType,
    payload: &'a Value,
}

/// Serialize an outbound request without cloning the payload.
pub fn encode_request(id: u64, request_type: RequestType, payload: &Value) -> Result<String> {
    serde_json::to_string(&RequestRef {
        id,
        request_type,
        payload,
    })
    .map_err(|e| ScError::Internal(format!("request encode failed: {e}")))
}

/// Parse an outbound request frame.
pub fn decode_request(text: &str) -> Result<Request> {
    serde_json::from_str(text).map_err(|e| ScError::BadFrame(format!("invalid request json: {e}")))
}

/// Answer to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    pub status: bool,
    pub payload: Value,
    pub errors: Option<Value>,
}

impl Response {
    /// Successful response with no errors.
    pub fn ok(id: u64, payload: Value) -> Self {
        Self {
            id,
            status: true,
            payload,
            errors: None,
        }
    }

    /// Server-reported failure extracted from `errors`, if any.
    pub fn server_error(&self, request_payload: &Value) -> Option<ServerError> {
        self.errors
            .as_ref()
            .and_then(|errors| ServerError::from_errors(errors, request_payload))
    }

    /// Turn a non-empty `errors` field into `ScError::Server`.
    pub fn into_result(self, request_payload: &Value) -> Result<Self> {
        match self.server_error(request_payload) {
            Some(err) => Err(ScError::Server(err)),
            None => Ok(self),
        }
    }

    /// Encode as an inbound response frame.
    pub fn to_frame(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "status": self.status,
            "event": false,
            "payload": self.payload,
            "errors": self.errors,
        })
        .to_string()
    }
}

/// Unsolicited notification for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFrame {
    pub subscription_id: u64,
    pub triple: EventTriple,
}

impl EventFrame {
    /// Encode as an inbound event frame.
    pub fn to_frame(&self) -> String {
        let [a, b, c] = self.triple.as_array();
        serde_json::json!({
            "id": self.subscription_id,
            "status": true,
            "event": true,
            "payload": [a.0, b.0, c.0],
            "errors": null,
        })
        .to_string()
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response(Response),
    Event(EventFrame),
}

#[derive(Deserialize)]
struct RawInbound<'a> {
    id: u64,
    #[serde(default, deserialize_with = "flag")]
    status: bool,
    #[serde(default, deserialize_with = "flag")]
    event: bool,
    #[serde(borrow, default)]
    payload: Option<&'a RawValue>,
    #[serde(default)]
    errors: Option<Value>,
}

/// Accepts `true`/`false` as well as `1`/`0`.
fn flag<'de, D>(de: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(de)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Null(()) => false,
    })
}

/// Decode an inbound text frame.
pub fn decode_inbound(text: &str) -> Result<Inbound> {
    let raw: RawInbound<'_> = serde_json::from_str(text)
        .map_err(|e| ScError::BadFrame(format!("invalid inbound json: {e}")))?;

    if raw.event {
        let payload = raw
            .payload
            .ok_or_else(|| ScError::BadFrame("event frame without payload".into()))?;
        let addrs: Vec<u64> = serde_json::from_str(payload.get())
            .map_err(|e| ScError::BadFrame(format!("event payload must be integers: {e}")))?;
        let [a, b, c]: [u64; 3] = addrs.try_into().map_err(|v: Vec<u64>| {
            ScError::BadFrame(format!("event payload must hold 3 elements, got {}", v.len()))
        })?;
        return Ok(Inbound::Event(EventFrame {
            subscription_id: raw.id,
            triple: EventTriple(ScAddr(a), ScAddr(b), ScAddr(c)),
        }));
    }

    let payload = match raw.payload {
        Some(p) => serde_json::from_str(p.get())
            .map_err(|e| ScError::BadFrame(format!("invalid response payload: {e}")))?,
        None => Value::Null,
    };
    let errors = match raw.errors {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    };
    Ok(Inbound::Response(Response {
        id: raw.id,
        status: raw.status,
        payload,
        errors,
    }))
}
