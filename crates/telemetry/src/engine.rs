//! Thread-safe telemetry accumulator.

use crate::model::{CallEvent, EndpointStats, TelemetrySummary};
use sockagent_core::{Error, Via};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

/// Recent events retained for export.
const EVENT_RETENTION: usize = 1000;

/// Latency samples retained for the percentile window.
const LATENCY_RETENTION: usize = 1000;

#[derive(Debug, Default)]
struct Counters {
    calls_total: u64,
    direct_calls: u64,
    llm_fallbacks: u64,
    cache_hits: u64,
    short_circuits: u64,
    successes: u64,
    failures: u64,
    tokens_used: u64,
    tokens_saved_estimate: u64,
}

#[derive(Debug, Default)]
struct EndpointAccum {
    calls: u64,
    successes: u64,
    cache_hits: u64,
    tokens_used: u64,
    latency_sum_ms: f64,
}

/// Accumulates call metrics for the process lifetime.
///
/// Counters, latencies, per-endpoint accumulators, and the recent-event
/// ring each sit behind their own lock; recording touches them in a
/// fixed order and never holds two locks at once.
pub struct Telemetry {
    enabled: bool,
    fallback_token_cost: u64,
    counters: RwLock<Counters>,
    latencies: RwLock<Vec<f64>>,
    per_endpoint: RwLock<BTreeMap<String, EndpointAccum>>,
    events: RwLock<Vec<CallEvent>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(true, 500)
    }
}

impl Telemetry {
    /// `fallback_token_cost` is the assumed token price of one
    /// LLM-fallback call, used for the savings estimate.
    pub fn new(enabled: bool, fallback_token_cost: u64) -> Self {
        Self {
            enabled,
            fallback_token_cost,
            counters: RwLock::new(Counters::default()),
            latencies: RwLock::new(Vec::new()),
            per_endpoint: RwLock::new(BTreeMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// A telemetry sink that records nothing.
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one finished call. A no-op when disabled.
    pub fn record(&self, event: CallEvent) {
        if !self.enabled {
            return;
        }

        {
            let mut c = self.counters.write().unwrap();
            c.calls_total += 1;
            match event.via {
                Via::Direct => c.direct_calls += 1,
                Via::Llm => c.llm_fallbacks += 1,
            }
            if event.cache_hit {
                c.cache_hits += 1;
            }
            if event.short_circuit {
                c.short_circuits += 1;
                c.tokens_saved_estimate += self.fallback_token_cost;
            }
            if event.success {
                c.successes += 1;
            } else {
                c.failures += 1;
            }
            c.tokens_used += event.tokens_used;
        }

        {
            let mut latencies = self.latencies.write().unwrap();
            latencies.push(event.latency_ms);
            if latencies.len() > LATENCY_RETENTION {
                let excess = latencies.len() - LATENCY_RETENTION;
                latencies.drain(..excess);
            }
        }

        {
            let mut per_endpoint = self.per_endpoint.write().unwrap();
            let accum = per_endpoint.entry(event.endpoint.clone()).or_default();
            accum.calls += 1;
            if event.success {
                accum.successes += 1;
            }
            if event.cache_hit {
                accum.cache_hits += 1;
            }
            accum.tokens_used += event.tokens_used;
            accum.latency_sum_ms += event.latency_ms;
        }

        let mut events = self.events.write().unwrap();
        events.push(event);
        if events.len() > EVENT_RETENTION {
            let excess = events.len() - EVENT_RETENTION;
            events.drain(..excess);
        }
    }

    /// Immutable snapshot of the totals. Latency figures cover the most
    /// recent [`LATENCY_RETENTION`] samples.
    pub fn summary(&self) -> TelemetrySummary {
        let c = self.counters.read().unwrap();
        let latencies = self.latencies.read().unwrap();

        let total = c.calls_total;
        let rate = |n: u64| if total == 0 { 0.0 } else { n as f64 / total as f64 };
        let avg = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        let mut sorted = latencies.clone();
        drop(latencies);
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        TelemetrySummary {
            calls_total: total,
            direct_calls: c.direct_calls,
            llm_fallbacks: c.llm_fallbacks,
            cache_hits: c.cache_hits,
            short_circuits: c.short_circuits,
            successes: c.successes,
            failures: c.failures,
            tokens_used: c.tokens_used,
            tokens_saved_estimate: c.tokens_saved_estimate,
            cache_hit_rate: rate(c.cache_hits),
            short_circuit_rate: rate(c.short_circuits),
            success_rate: rate(c.successes),
            avg_latency_ms: avg,
            p50_latency_ms: percentile(&sorted, 50.0),
            p95_latency_ms: percentile(&sorted, 95.0),
        }
    }

    /// Per-endpoint breakdown.
    pub fn endpoint_stats(&self) -> BTreeMap<String, EndpointStats> {
        self.per_endpoint
            .read()
            .unwrap()
            .iter()
            .map(|(endpoint, a)| {
                (
                    endpoint.clone(),
                    EndpointStats {
                        calls: a.calls,
                        successes: a.successes,
                        failures: a.calls - a.successes,
                        cache_hits: a.cache_hits,
                        tokens_used: a.tokens_used,
                        avg_latency_ms: if a.calls == 0 {
                            0.0
                        } else {
                            a.latency_sum_ms / a.calls as f64
                        },
                    },
                )
            })
            .collect()
    }

    /// Serialize the summary, breakdown, and recent events as JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let report = serde_json::json!({
            "summary": self.summary(),
            "endpoints": self.endpoint_stats(),
            "recent_events": *self.events.read().unwrap(),
        });
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).map_err(|e| Error::Internal(e.to_string()))?;
        info!(path = %path.as_ref().display(), "telemetry exported");
        Ok(())
    }

    /// Zero every counter and drop retained events.
    pub fn reset(&self) {
        *self.counters.write().unwrap() = Counters::default();
        self.latencies.write().unwrap().clear();
        self.per_endpoint.write().unwrap().clear();
        self.events.write().unwrap().clear();
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(success: bool, via: Via, latency: f64) -> CallEvent {
        CallEvent {
            success,
            latency_ms: latency,
            short_circuit: matches!(via, Via::Direct),
            ..CallEvent::now("post_todo", via)
        }
    }

    #[test]
    fn counters_accumulate_additively() {
        let telemetry = Telemetry::new(true, 500);
        telemetry.record(event(true, Via::Direct, 10.0));
        telemetry.record(event(true, Via::Direct, 20.0));
        telemetry.record(event(false, Via::Llm, 300.0));

        let s = telemetry.summary();
        assert_eq!(s.calls_total, 3);
        assert_eq!(s.direct_calls, 2);
        assert_eq!(s.llm_fallbacks, 1);
        assert_eq!(s.successes, 2);
        assert_eq!(s.failures, 1);
        assert_eq!(s.successes + s.failures, s.calls_total);
        assert_eq!(s.short_circuits, 2);
        assert_eq!(s.tokens_saved_estimate, 1000);
        assert!((s.avg_latency_ms - 110.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_telemetry_records_nothing() {
        let telemetry = Telemetry::disabled();
        telemetry.record(event(true, Via::Direct, 10.0));
        assert_eq!(telemetry.summary().calls_total, 0);
        assert!(telemetry.endpoint_stats().is_empty());
    }

    #[test]
    fn percentiles_over_latencies() {
        let telemetry = Telemetry::new(true, 500);
        for i in 1..=100 {
            telemetry.record(event(true, Via::Direct, i as f64));
        }
        let s = telemetry.summary();
        assert!((s.p50_latency_ms - 50.0).abs() <= 1.0);
        assert!((s.p95_latency_ms - 95.0).abs() <= 1.0);
    }

    #[test]
    fn latency_retention_stays_bounded() {
        let telemetry = Telemetry::new(true, 500);
        for i in 1..=1500 {
            telemetry.record(event(true, Via::Direct, i as f64));
        }

        assert_eq!(telemetry.latencies.read().unwrap().len(), LATENCY_RETENTION);
        assert_eq!(telemetry.events.read().unwrap().len(), EVENT_RETENTION);

        // Counters still see every call; percentiles cover the newest
        // 1000 samples (501..=1500).
        let s = telemetry.summary();
        assert_eq!(s.calls_total, 1500);
        assert!((s.p50_latency_ms - 1000.0).abs() <= 1.0);
        assert!((s.p95_latency_ms - 1450.0).abs() <= 1.0);
    }

    #[test]
    fn endpoint_breakdown_tracks_failures() {
        let telemetry = Telemetry::new(true, 500);
        telemetry.record(event(true, Via::Direct, 10.0));
        telemetry.record(event(false, Via::Direct, 30.0));

        let stats = telemetry.endpoint_stats();
        let endpoint = &stats["post_todo"];
        assert_eq!(endpoint.calls, 2);
        assert_eq!(endpoint.successes, 1);
        assert_eq!(endpoint.failures, 1);
        assert!((endpoint.avg_latency_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn reset_zeroes_everything() {
        let telemetry = Telemetry::new(true, 500);
        telemetry.record(event(true, Via::Direct, 10.0));
        telemetry.reset();

        let s = telemetry.summary();
        assert_eq!(s.calls_total, 0);
        assert_eq!(s.tokens_saved_estimate, 0);
        assert_eq!(s.p95_latency_ms, 0.0);
    }

    #[test]
    fn export_writes_full_report() {
        let telemetry = Telemetry::new(true, 500);
        telemetry.record(event(true, Via::Direct, 10.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");
        telemetry.export(&path).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["summary"]["calls_total"], 1);
        assert!(report["endpoints"]["post_todo"].is_object());
        assert_eq!(report["recent_events"].as_array().unwrap().len(), 1);
    }
}
