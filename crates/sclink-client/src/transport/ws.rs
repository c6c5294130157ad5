//! WebSocket transport backed by tokio-tungstenite.
//!
//! Responsibilities:
//! - Open the socket (`connect_async`) and split it
//! - Expose the write half as a `FrameSink`
//! - Turn the read half into a `FrameStream` of text frames
//!
//! `wss://` goes through rustls with the webpki root set.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::transport::codec::{classify, decode, Decoded};
use crate::transport::{Channel, Connector, FrameSink, FrameStream, TransportError};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for `ws://` / `wss://` urls.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Channel, TransportError> {
        if url.starts_with("wss://") {
            install_crypto_provider();
        }
        let (ws, _resp) = connect_async(url)
            .await
            .map_err(|e| TransportError::Refused(e.to_string()))?;
        tracing::debug!(%url, "websocket handshake complete");

        let (tx, rx) = ws.split();
        Ok(Channel {
            sink: Box::new(WsSink { tx }),
            frames: frame_stream(rx),
        })
    }
}

/// rustls needs a process-wide provider; keep one the application installed.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

struct WsSink {
    tx: SplitSink<Ws, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.tx.send(Message::Text(text)).await.map_err(classify)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.tx.close().await.map_err(classify) {
            Ok(()) | Err(TransportError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

enum ReadState {
    Open(SplitStream<Ws>),
    Done,
}

fn frame_stream(rx: SplitStream<Ws>) -> FrameStream {
    futures_util::stream::unfold(ReadState::Open(rx), |state| async move {
        let ReadState::Open(mut rx) = state else {
            return None;
        };
        loop {
            match rx.next().await {
                Some(Ok(msg)) => match decode(msg) {
                    Decoded::Text(s) => return Some((Ok(s), ReadState::Open(rx))),
                    Decoded::Skip => continue,
                    Decoded::Close => return Some((Err(TransportError::Closed), ReadState::Done)),
                },
                Some(Err(e)) => return Some((Err(classify(e)), ReadState::Done)),
                None => return Some((Err(TransportError::Closed), ReadState::Done)),
            }
        }
    })
    .boxed()
}
