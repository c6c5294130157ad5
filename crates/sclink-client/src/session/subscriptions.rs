use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use sclink_core::protocol::{EventTriple, ScAddr, ScEventType};

type TaskFn = dyn Fn(EventTriple) -> BoxFuture<'static, ()> + Send + Sync;
type ThreadFn = dyn Fn(EventTriple) + Send + Sync;

/// Event handler. Always invoked off the dispatch loop.
#[derive(Clone)]
pub enum EventCallback {
    /// Runs as a spawned tokio task.
    Task(Arc<TaskFn>),
    /// Runs on its own OS thread; may block, may call a blocking client.
    Thread(Arc<ThreadFn>),
}

impl EventCallback {
    pub fn task<F, Fut>(f: F) -> Self
    where
        F: Fn(EventTriple) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        EventCallback::Task(Arc::new(move |triple| f(triple).boxed()))
    }

    pub fn thread<F>(f: F) -> Self
    where
        F: Fn(EventTriple) + Send + Sync + 'static,
    {
        EventCallback::Thread(Arc::new(f))
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCallback::Task(_) => f.write_str("EventCallback::Task"),
            EventCallback::Thread(_) => f.write_str("EventCallback::Thread"),
        }
    }
}

/// Server-side event registration as seen by the client.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Assigned by the server.
    pub id: u64,
    pub event_type: ScEventType,
    pub addr: ScAddr,
    pub callback: EventCallback,
}

/// Subscription registry: `subscription id -> Subscription`.
/// Last write wins for a given id.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subs: DashMap<u64, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subs: DashMap::new(),
        }
    }

    pub fn put(&self, sub: Subscription) {
        self.subs.insert(sub.id, sub);
    }

    pub fn get(&self, id: u64) -> Option<Subscription> {
        self.subs.get(&id).map(|r| r.value().clone())
    }

    pub fn remove(&self, id: u64) -> Option<Subscription> {
        self.subs.remove(&id).map(|(_, sub)| sub)
    }

    pub fn clear(&self) {
        self.subs.clear();
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.subs.iter().map(|e| *e.key()).collect()
    }
}
