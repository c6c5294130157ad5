//! sclink core: transport-agnostic wire envelopes and the error surface.
//!
//! This crate defines the JSON frames exchanged with sc-server and the error
//! kinds shared by the client runtime and its callers. It carries no
//! transport or runtime dependencies so it can be reused by server stubs and
//! test tooling.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths surface as `ScError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, Result, ScError, ServerError, ServerErrorEntry};
