//! Session layer: one sc-server connection and its bookkeeping.

pub mod connection;
pub mod correlation;
pub mod hooks;
pub(crate) mod retry;
pub mod subscriptions;

pub use connection::{Connection, ConnectionState, WeakConnection};
pub use correlation::{CorrelationTable, PendingSlot};
pub use hooks::Hooks;
pub use subscriptions::{EventCallback, Subscription, SubscriptionRegistry};
