//! # sockagent Learner
//!
//! Records (intent, call, result) observations, mines recurring
//! text→call patterns from them, and freezes high-confidence patterns
//! into a portable stub artifact.
//!
//! Learning is strictly additive to routing: mining failures and corrupt
//! observations are logged and isolated, never surfaced to callers.

pub mod log;
pub mod mine;

pub use log::ObservationLog;

use chrono::Utc;
use sockagent_core::{ApiCall, ApiResult, LearnedPattern, StubFile, STUB_FORMAT_VERSION};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::info;

/// Default observation count a group needs before mining considers it.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 5;
/// Default confidence floor for patterns exported into a stub.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.8;

/// Mines learned patterns from accumulated observations.
///
/// Promotion is monotone per endpoint: a re-mined pattern replaces the
/// promoted one only when its confidence is not lower. Observation
/// counts never decay.
pub struct PatternLearner {
    log: ObservationLog,
    min_observations: usize,
    min_confidence: f64,
    promoted: RwLock<HashMap<String, LearnedPattern>>,
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLearner {
    pub fn new() -> Self {
        Self {
            log: ObservationLog::new(),
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            promoted: RwLock::new(HashMap::new()),
        }
    }

    /// Cap the observation log (oldest-first eviction).
    pub fn with_retention(mut self, max_observations: usize) -> Self {
        self.log = ObservationLog::with_capacity(max_observations);
        self
    }

    /// Override the per-group mining minimum.
    pub fn with_min_observations(mut self, min: usize) -> Self {
        self.min_observations = min.max(1);
        self
    }

    /// Override the stub export confidence floor.
    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = min.clamp(0.0, 1.0);
        self
    }

    /// Record one interaction. Failed calls are recorded too — they
    /// lower mined confidence instead of being hidden.
    pub fn observe(&self, intent: impl Into<String>, call: ApiCall, result: ApiResult) {
        self.log
            .push(sockagent_core::Observation::new(intent, call, result));
    }

    /// The underlying observation log.
    pub fn log(&self) -> &ObservationLog {
        &self.log
    }

    /// Re-mine the log and fold results into the promoted set.
    ///
    /// Returns the promoted patterns sorted by descending confidence,
    /// ready for atomic installation into a router.
    pub fn analyze_patterns(&self) -> Vec<LearnedPattern> {
        let mined = mine::mine(&self.log.snapshot(), self.min_observations);

        let mut promoted = self.promoted.write().unwrap();
        for pattern in mined {
            let key = format!(
                "{}:{}",
                pattern.api_pattern.method, pattern.api_pattern.path
            );
            match promoted.get(&key) {
                Some(existing) if existing.confidence > pattern.confidence => {}
                _ => {
                    promoted.insert(key, pattern);
                }
            }
        }

        let mut patterns: Vec<LearnedPattern> = promoted.values().cloned().collect();
        drop(promoted);
        patterns.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.observations.cmp(&a.observations))
        });
        patterns
    }

    /// Freeze patterns at or above the confidence floor into a portable
    /// stub artifact.
    pub fn generate_stub(&self, source: impl Into<String>) -> StubFile {
        let learned_patterns: Vec<LearnedPattern> = self
            .analyze_patterns()
            .into_iter()
            .filter(|p| p.confidence >= self.min_confidence)
            .collect();

        let observations = self.log.snapshot();
        let unique_intents: BTreeSet<String> = observations
            .iter()
            .map(|o| o.intent.to_lowercase())
            .collect();
        let endpoints_used: BTreeSet<String> = observations
            .iter()
            .map(|o| o.call.endpoint_key())
            .collect();

        let stub = StubFile {
            version: STUB_FORMAT_VERSION.into(),
            source: source.into(),
            created_at: Utc::now(),
            learned_patterns,
            metadata: BTreeMap::from([
                ("total_calls".into(), serde_json::json!(observations.len())),
                (
                    "unique_intents".into(),
                    serde_json::json!(unique_intents.len()),
                ),
                (
                    "endpoints_used".into(),
                    serde_json::json!(endpoints_used.into_iter().collect::<Vec<_>>()),
                ),
            ]),
        };
        info!(
            patterns = stub.learned_patterns.len(),
            source = %stub.source,
            "stub generated"
        );
        stub
    }
}
