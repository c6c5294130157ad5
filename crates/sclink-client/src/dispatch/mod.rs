//! Inbound dispatch.
//!
//! One loop per channel generation: decodes frames in arrival order, resolves
//! pending requests and hands events to subscription callbacks.

mod dispatcher;

pub(crate) use dispatcher::spawn_inbound_loop;
