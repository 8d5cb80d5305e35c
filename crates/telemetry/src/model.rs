//! Telemetry value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sockagent_core::Via;

/// One finished call, as seen by telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEvent {
    /// Endpoint (stub name), or "unknown" for unrouted fallbacks.
    pub endpoint: String,
    /// How the call was resolved.
    pub via: Via,
    /// Routing confidence at decision time.
    pub confidence: f64,
    /// LLM tokens consumed (0 on the direct path).
    pub tokens_used: u64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: f64,
    /// Whether the call succeeded.
    pub success: bool,
    /// Whether the result came from cache.
    pub cache_hit: bool,
    /// Whether routing short-circuited (a `Direct` decision).
    pub short_circuit: bool,
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
}

impl CallEvent {
    /// An event with the current timestamp; the rest via struct update.
    pub fn now(endpoint: impl Into<String>, via: Via) -> Self {
        Self {
            endpoint: endpoint.into(),
            via,
            confidence: 0.0,
            tokens_used: 0,
            latency_ms: 0.0,
            success: false,
            cache_hit: false,
            short_circuit: false,
            timestamp: Utc::now(),
        }
    }
}

/// Immutable snapshot of accumulated totals.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetrySummary {
    pub calls_total: u64,
    pub direct_calls: u64,
    pub llm_fallbacks: u64,
    pub cache_hits: u64,
    pub short_circuits: u64,
    pub successes: u64,
    pub failures: u64,
    pub tokens_used: u64,
    /// Estimated tokens avoided by short-circuiting instead of
    /// delegating to the LLM. A heuristic (configured per-call cost
    /// times short-circuit count), not ground truth.
    pub tokens_saved_estimate: u64,
    pub cache_hit_rate: f64,
    pub short_circuit_rate: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
}

/// Accumulated counters for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub tokens_used: u64,
    pub avg_latency_ms: f64,
}
