//! Shared error type across sclink crates.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Stable error kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport could not be established at all.
    ConnectionRefused,
    /// `send` before any successful `connect`.
    NotConnected,
    /// `send` after a caller-initiated disconnect.
    AlreadyDisconnected,
    /// The channel dropped while the request was outstanding.
    ConnectionLost,
    /// Retry budget exhausted without a successful resend.
    ServerTimeout,
    /// Local pre-flight size check failed.
    PayloadTooLarge,
    /// The server answered with a non-empty `errors` field.
    ServerReported,
    /// Inbound frame could not be decoded.
    BadFrame,
    /// Configuration rejected by validation.
    InvalidConfig,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorKind::NotConnected => "NOT_CONNECTED",
            ErrorKind::AlreadyDisconnected => "ALREADY_DISCONNECTED",
            ErrorKind::ConnectionLost => "CONNECTION_LOST",
            ErrorKind::ServerTimeout => "SERVER_TIMEOUT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::ServerReported => "SERVER_REPORTED",
            ErrorKind::BadFrame => "BAD_FRAME",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ScError>;

/// Unified error type used by core and client.
#[derive(Debug, Clone, Error)]
pub enum ScError {
    #[error("cannot connect to sc-server: {0}")]
    ConnectionRefused(String),
    #[error("not connected to sc-server")]
    NotConnected,
    #[error("already disconnected from the sc-server")]
    AlreadyDisconnected,
    #[error("connection to sc-server lost")]
    ConnectionLost,
    #[error("sc-server takes a long time to respond")]
    ServerTimeout,
    #[error("payload too large: {size} > {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("sc-server error: {0}")]
    Server(ServerError),
    #[error("bad frame: {0}")]
    BadFrame(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ScError {
    /// Map to the stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            ScError::NotConnected => ErrorKind::NotConnected,
            ScError::AlreadyDisconnected => ErrorKind::AlreadyDisconnected,
            ScError::ConnectionLost => ErrorKind::ConnectionLost,
            ScError::ServerTimeout => ErrorKind::ServerTimeout,
            ScError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            ScError::Server(_) => ErrorKind::ServerReported,
            ScError::BadFrame(_) => ErrorKind::BadFrame,
            ScError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ScError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// One entry of a server-reported failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerErrorEntry {
    pub message: String,
    /// Index into the batched request payload, when the server names one.
    pub reference: Option<usize>,
    /// The payload element `reference` points at.
    pub payload: Option<Value>,
}

/// Application-level rejection carried in a response's `errors` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub entries: Vec<ServerErrorEntry>,
}

impl ServerError {
    /// Build from a raw `errors` value. Returns `None` when the value is
    /// null, an empty string, an empty list or an empty object.
    ///
    /// `request_payload` is consulted to attach the element named by `ref`.
    pub fn from_errors(errors: &Value, request_payload: &Value) -> Option<Self> {
        let entries = match errors {
            Value::Null => return None,
            Value::String(s) if s.is_empty() => return None,
            Value::String(s) => vec![ServerErrorEntry {
                message: s.clone(),
                reference: None,
                payload: None,
            }],
            Value::Array(items) => items
                .iter()
                .map(|item| entry_from_value(item, request_payload))
                .collect(),
            Value::Object(map) if map.is_empty() => return None,
            other => vec![entry_from_value(other, request_payload)],
        };
        if entries.is_empty() {
            return None;
        }
        Some(Self { entries })
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }
}

fn entry_from_value(item: &Value, request_payload: &Value) -> ServerErrorEntry {
    let message = match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| item.to_string()),
        other => other.to_string(),
    };
    let reference = item
        .get("ref")
        .and_then(Value::as_u64)
        .and_then(|r| usize::try_from(r).ok());
    let payload = reference.and_then(|r| request_payload.get(r).cloned());
    ServerErrorEntry {
        message,
        reference,
        payload,
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&entry.message)?;
            if let Some(payload) = &entry.payload {
                write!(f, "\nPayload: {payload}")?;
            }
        }
        Ok(())
    }
}
