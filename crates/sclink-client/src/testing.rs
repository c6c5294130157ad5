//! In-process scripted sc-server for tests.
//!
//! `MockServer` hands out a [`Connector`] whose channels never touch the
//! network. The server records every frame it receives and every connect
//! attempt, answers through a responder closure, and can be told to refuse
//! connects, lose sends, drop the live channel or push arbitrary frames.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use sclink_core::protocol::{decode_request, EventFrame, EventTriple, Request, Response};

use crate::transport::{Channel, Connector, FrameSink, TransportError};

type Responder = Arc<dyn Fn(&Request) -> Option<Response> + Send + Sync>;
type InboundTx = mpsc::UnboundedSender<Result<String, TransportError>>;

struct LiveChannel {
    id: u64,
    tx: InboundTx,
    dead: Arc<AtomicBool>,
}

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<String>>,
    connect_attempts: AtomicUsize,
    refuse: AtomicBool,
    lose_next_sends: AtomicUsize,
    next_channel: AtomicU64,
    responder: RwLock<Option<Responder>>,
    live: Mutex<Option<LiveChannel>>,
}

impl ServerState {
    fn take_live(&self, channel: Option<u64>) -> Option<LiveChannel> {
        let mut live = self.live.lock().ok()?;
        if let (Some(l), Some(id)) = (live.as_ref(), channel) {
            if l.id != id {
                return None;
            }
        }
        live.take()
    }
}

/// Scripted server. Clones share state.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<ServerState>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server that answers every request with `status: true` and a null payload.
    pub fn acking() -> Self {
        let server = Self::new();
        server.respond_with(|req| Some(Response::ok(req.id, serde_json::Value::Null)));
        server
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            state: self.state.clone(),
        })
    }

    /// Install the responder. `None` leaves the request unanswered.
    pub fn respond_with<F>(&self, f: F)
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        if let Ok(mut r) = self.state.responder.write() {
            *r = Some(Arc::new(f));
        }
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    /// The next `n` sends break the live channel instead of arriving.
    pub fn lose_next_sends(&self, n: usize) {
        self.state.lose_next_sends.store(n, Ordering::SeqCst);
    }

    /// Kill the live channel as if the network went away.
    pub fn drop_connection(&self) -> bool {
        match self.state.take_live(None) {
            Some(live) => {
                live.dead.store(true, Ordering::SeqCst);
                let _ = live.tx.send(Err(TransportError::Lost("connection dropped by server".into())));
                true
            }
            None => false,
        }
    }

    /// Push a raw frame to the client over the live channel.
    pub fn inject(&self, frame: impl Into<String>) -> bool {
        let Ok(live) = self.state.live.lock() else {
            return false;
        };
        match &*live {
            Some(l) => l.tx.send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    pub fn inject_event(&self, subscription_id: u64, triple: EventTriple) -> bool {
        self.inject(EventFrame { subscription_id, triple }.to_frame())
    }

    pub fn is_live(&self) -> bool {
        self.state.live.lock().map(|l| l.is_some()).unwrap_or(false)
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Frames that reached the server, in arrival order.
    pub fn received_frames(&self) -> Vec<String> {
        self.state.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn received_requests(&self) -> Vec<Request> {
        self.received_frames()
            .iter()
            .filter_map(|f| decode_request(f).ok())
            .collect()
    }

    pub fn received_count(&self) -> usize {
        self.state.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Wait until at least `n` frames arrived. Returns false on timeout.
    pub async fn wait_for_frames(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.received_count() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        true
    }
}

/// Connector side of [`MockServer`].
pub struct MockConnector {
    state: Arc<ServerState>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Channel, TransportError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Refused(format!("{url}: connection refused by mock server")));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.state.next_channel.fetch_add(1, Ordering::SeqCst);
        let dead = Arc::new(AtomicBool::new(false));
        if let Ok(mut live) = self.state.live.lock() {
            *live = Some(LiveChannel {
                id,
                tx: tx.clone(),
                dead: dead.clone(),
            });
        }

        let frames = stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed();
        let sink = MockSink {
            state: self.state.clone(),
            id,
            tx,
            dead,
        };
        Ok(Channel {
            sink: Box::new(sink),
            frames,
        })
    }
}

struct MockSink {
    state: Arc<ServerState>,
    id: u64,
    tx: InboundTx,
    dead: Arc<AtomicBool>,
}

impl MockSink {
    fn kill(&self, err: TransportError) {
        self.dead.store(true, Ordering::SeqCst);
        self.state.take_live(Some(self.id));
        let _ = self.tx.send(Err(err));
    }
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(TransportError::Lost("channel is gone".into()));
        }

        let lose = self
            .state
            .lose_next_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lose {
            let err = TransportError::Lost("send lost".into());
            self.kill(err.clone());
            return Err(err);
        }

        if let Ok(mut received) = self.state.received.lock() {
            received.push(text.clone());
        }

        let responder = self.state.responder.read().ok().and_then(|r| r.clone());
        if let (Some(responder), Ok(req)) = (responder, decode_request(&text)) {
            if let Some(resp) = responder(&req) {
                let _ = self.tx.send(Ok(resp.to_frame()));
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.dead.swap(true, Ordering::SeqCst) {
            self.state.take_live(Some(self.id));
            let _ = self.tx.send(Err(TransportError::Closed));
        }
        Ok(())
    }
}
