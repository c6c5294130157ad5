//! Transport layer (duplex text-frame channel).
//!
//! The connection manager owns the policy (retries, clean vs lost close);
//! a transport only knows how to open a channel, push text frames into it
//! and surface inbound frames as a stream.

pub mod codec;
pub mod ws;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use ws::WsConnector;

/// Transport-level failure.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The channel could not be opened.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The channel was closed with a close handshake.
    #[error("connection closed")]
    Closed,
    /// The channel broke (I/O, protocol error, peer vanished).
    #[error("connection lost: {0}")]
    Lost(String),
}

/// Inbound frames. The stream ends when the channel is gone; a trailing
/// `Err` describes how it went away.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Write half of a live channel.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A freshly opened channel.
pub struct Channel {
    pub sink: Box<dyn FrameSink>,
    pub frames: FrameStream,
}

/// Opens channels. One connector serves every (re)connect of a connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Channel, TransportError>;
}
