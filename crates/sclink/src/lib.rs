//! Top-level facade crate for sclink.
//!
//! Re-exports the wire/error types and the client library so users can depend on a single crate.

pub mod core {
    pub use sclink_core::*;
}

pub mod client {
    pub use sclink_client::*;
}
