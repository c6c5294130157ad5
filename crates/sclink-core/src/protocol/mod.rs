//! Wire protocol (JSON text frames).
//!
//! - `envelope`: outbound request / inbound response and event frames.
//! - `types`: request kinds, event kinds and the opaque element address.
//!
//! Decoding is panic-free: malformed input is reported as `ScError::BadFrame`
//! instead of panicking, so one bad frame never takes down the dispatch loop.

pub mod envelope;
pub mod types;

pub use envelope::{decode_inbound, decode_request, encode_request, EventFrame, Inbound, Request, Response};
pub use types::{EventTriple, RequestType, ScAddr, ScEventType};
