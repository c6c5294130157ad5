//! Lightweight in-process metrics (dependency-free).
//!
//! Counters and histograms are stored as atomics keyed by label sets and can
//! be rendered in Prometheus text format by the embedding application.

pub mod metrics;

pub use metrics::ClientMetrics;
