//! Reconnect step of the send retry policy.
//!
//! The budget and the constant delay live in `Connection::send`; this module
//! only performs one attempt, with the link lock held by the caller.

use std::sync::Arc;

use sclink_core::error::ScError;

use crate::dispatch;
use crate::session::connection::{ConnectionState, Inner, Link, LinkStatus};

#[derive(Debug)]
pub(crate) enum ReconnectOutcome {
    /// A new channel is live.
    Opened,
    /// Another send already replaced the channel observed as lost.
    Shared,
    Failed(ScError),
}

/// Reopen the channel lost at generation `observed`.
///
/// Keeps the request counter and the subscription registry. Slots still
/// waiting on the old channel can no longer be answered and are failed.
pub(crate) async fn reconnect(inner: &Arc<Inner>, link: &mut Link, observed: u64) -> ReconnectOutcome {
    if link.generation != observed || !matches!(link.status, LinkStatus::Lost) {
        return ReconnectOutcome::Shared;
    }
    let Some(url) = link.url.clone() else {
        return ReconnectOutcome::Failed(ScError::NotConnected);
    };

    inner.set_state(ConnectionState::Reconnecting);
    match inner.connector.connect(&url).await {
        Ok(channel) => {
            link.generation += 1;
            let generation = link.generation;
            let stale = inner.pending.fail_up_to(observed, &ScError::ConnectionLost);

            link.status = LinkStatus::Live(channel.sink);
            inner.set_state(ConnectionState::Connected);
            dispatch::spawn_inbound_loop(Arc::downgrade(inner), channel.frames, generation);

            tracing::info!(%url, generation, stale, "connection reopened");
            ReconnectOutcome::Opened
        }
        Err(e) => {
            inner.set_state(ConnectionState::Disconnected);
            ReconnectOutcome::Failed(ScError::ConnectionRefused(e.to_string()))
        }
    }
}
