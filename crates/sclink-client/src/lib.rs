//! sclink client runtime.
//!
//! This crate wires the transport, the session layer (connection state
//! machine, correlation table, subscription registry) and the inbound
//! dispatcher into an sc-server client, with async (`ScClient`) and blocking
//! (`BlockingClient`) facades on top.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod blocking;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod obs;
pub mod session;
pub mod testing;
pub mod transport;

pub use blocking::{BlockingClient, WeakBlockingClient};
pub use client::{KeynodeParams, ScClient, SubscriptionParams};
pub use config::{ClientConfig, ConnectionSettings};
pub use session::{Connection, ConnectionState, EventCallback, Hooks, Subscription};
