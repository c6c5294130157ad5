use std::sync::Weak;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use sclink_core::protocol::{decode_inbound, EventTriple, Inbound, Response};

use crate::session::connection::Inner;
use crate::session::subscriptions::{EventCallback, Subscription};
use crate::transport::FrameStream;

/// Spawn the inbound loop of channel `generation`.
///
/// The loop only holds a `Weak` handle; it exits once the connection is
/// dropped or the stream ends.
pub(crate) fn spawn_inbound_loop(conn: Weak<Inner>, frames: FrameStream, generation: u64) -> JoinHandle<()> {
    tokio::spawn(run(conn, frames, generation))
}

async fn run(conn: Weak<Inner>, mut frames: FrameStream, generation: u64) {
    let reason = loop {
        match frames.next().await {
            Some(Ok(text)) => {
                let Some(inner) = conn.upgrade() else { return };
                route(&inner, &text);
            }
            Some(Err(e)) => break Some(e),
            None => break None,
        }
    };

    if let Some(inner) = conn.upgrade() {
        inner.channel_ended(generation, reason).await;
    }
}

/// Route one inbound frame: events to subscriptions, responses to slots.
fn route(inner: &Inner, text: &str) {
    match decode_inbound(text) {
        Ok(Inbound::Event(ev)) => match inner.subscriptions.get(ev.subscription_id) {
            Some(sub) => {
                tracing::debug!(id = sub.id, triple = ?ev.triple.as_array(), "event dispatched");
                inner.metrics.events.inc(&[("outcome", "dispatched")]);
                dispatch_event(&sub, ev.triple);
            }
            None => {
                tracing::debug!(id = ev.subscription_id, "event for unknown subscription dropped");
                inner.metrics.events.inc(&[("outcome", "orphaned")]);
            }
        },
        Ok(Inbound::Response(resp)) => resolve(inner, resp),
        Err(e) => {
            tracing::warn!(error = %e, "malformed frame skipped");
            inner.metrics.bad_frames.inc(&[]);
            if looks_like_event(text) {
                inner.metrics.events.inc(&[("outcome", "malformed")]);
            }
        }
    }
}

fn resolve(inner: &Inner, resp: Response) {
    let id = resp.id;
    if !inner.pending.resolve(id, resp) {
        tracing::debug!(id, "response without waiter dropped");
        inner.metrics.stale_responses.inc(&[]);
    }
}

fn looks_like_event(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").cloned())
        .is_some_and(|flag| flag == serde_json::Value::Bool(true) || flag == serde_json::json!(1))
}

/// Run the callback off the loop.
fn dispatch_event(sub: &Subscription, triple: EventTriple) {
    match &sub.callback {
        EventCallback::Task(f) => {
            tokio::spawn(f(triple));
        }
        EventCallback::Thread(f) => {
            let f = f.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("sc-event-{}", sub.id))
                .spawn(move || f(triple));
            if let Err(e) = spawned {
                tracing::error!(id = sub.id, error = %e, "cannot spawn event thread");
            }
        }
    }
}
