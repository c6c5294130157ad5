//! Lifecycle hooks.
//!
//! Hooks are synchronous and run inline on whichever task performs the
//! transition (connect, disconnect, dispatch loop teardown, retry). Keep them
//! short; spawn if real work is needed.

use std::fmt;
use std::sync::Arc;

use sclink_core::ScError;

type Hook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ScError) + Send + Sync>;

/// Optional handler slots. Unset slots are no-ops.
#[derive(Clone, Default)]
pub struct Hooks {
    on_open: Option<Hook>,
    on_close: Option<Hook>,
    on_error: Option<ErrorHook>,
    on_reconnect: Option<Hook>,
    on_post_reconnect: Option<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// After every successful open (first connect and reconnects).
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// After a caller-initiated disconnect.
    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// On refused connects, lost channels and failed sends.
    pub fn on_error(mut self, f: impl Fn(&ScError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Before each reconnect attempt of the retry policy.
    pub fn on_reconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }

    /// After the retry policy re-established the channel.
    pub fn on_post_reconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_post_reconnect = Some(Arc::new(f));
        self
    }

    pub(crate) fn opened(&self) {
        if let Some(f) = &self.on_open {
            f();
        }
    }

    pub(crate) fn closed(&self) {
        if let Some(f) = &self.on_close {
            f();
        }
    }

    pub(crate) fn error(&self, err: &ScError) {
        if let Some(f) = &self.on_error {
            f(err);
        }
    }

    pub(crate) fn reconnecting(&self) {
        if let Some(f) = &self.on_reconnect {
            f();
        }
    }

    pub(crate) fn reconnected(&self) {
        if let Some(f) = &self.on_post_reconnect {
            f();
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_post_reconnect", &self.on_post_reconnect.is_some())
            .finish()
    }
}
