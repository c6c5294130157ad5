//! WebSocket message <-> text frame mapping.
//!
//! - Text frames pass through
//! - Binary frames are accepted when they are valid UTF-8
//! - Ping/Pong/raw frames are control traffic and are skipped
//! - Close ends the stream

use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::transport::TransportError;

#[derive(Debug)]
pub enum Decoded {
    Text(String),
    Skip,
    Close,
}

pub fn decode(msg: Message) -> Decoded {
    match msg {
        Message::Text(s) => Decoded::Text(s),
        Message::Binary(b) => match String::from_utf8(b) {
            Ok(s) => Decoded::Text(s),
            Err(e) => {
                tracing::warn!(error = %e, "dropping non utf-8 binary frame");
                Decoded::Skip
            }
        },
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Decoded::Skip,
        Message::Close(_) => Decoded::Close,
    }
}

/// Classify a tungstenite error.
pub fn classify(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Lost(other.to_string()),
    }
}
