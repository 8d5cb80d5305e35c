//! # sockagent Telemetry
//!
//! Call metrics for the smart client: how often routing short-circuits,
//! how often the cache answers, what the LLM fallback costs in tokens,
//! and latency percentiles — per process and per endpoint.
//!
//! Accumulation is monotone for the process lifetime unless `reset()`
//! is called. Disabled telemetry is a strict no-op.

pub mod engine;
pub mod model;

pub use engine::Telemetry;
pub use model::{CallEvent, EndpointStats, TelemetrySummary};
