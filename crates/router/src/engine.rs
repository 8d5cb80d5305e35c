//! The rules engine — routes free text to an endpoint with a confidence.
//!
//! Learned patterns are consulted first, in descending confidence order;
//! the first match at or above the pattern floor wins. Otherwise every
//! heuristic matcher compiled from the descriptor is tried and the best
//! candidate is taken. An injected [`Scorer`] may boost candidates but
//! never demotes a match below its engine-assigned confidence.

use crate::matcher::{ActivePattern, MatchOutcome, Matcher, MatchTarget};
use crate::stub::{resource_from_path, StubStore};
use regex::Regex;
use sockagent_config::Policy;
use sockagent_core::{LearnedPattern, RouteResult, ScoreCandidate, Scorer};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Learned matches below this confidence never short-circuit heuristics.
const DEFAULT_PATTERN_FLOOR: f64 = 0.5;

/// The routing decision core.
///
/// Heuristic matchers are immutable after construction; learned patterns
/// live behind a snapshot that `install_patterns` swaps atomically, so
/// in-flight routes keep the set they started with.
pub struct RulesEngine {
    store: Arc<StubStore>,
    policy: Policy,
    heuristics: Vec<Matcher>,
    learned: RwLock<Arc<Vec<ActivePattern>>>,
    scorer: Option<Arc<dyn Scorer>>,
    pattern_floor: f64,
}

impl RulesEngine {
    /// Build an engine over a compiled stub table.
    pub fn new(store: Arc<StubStore>, policy: Policy) -> Self {
        let heuristics = build_heuristics(&store);
        Self {
            store,
            policy,
            heuristics,
            learned: RwLock::new(Arc::new(Vec::new())),
            scorer: None,
            pattern_floor: DEFAULT_PATTERN_FLOOR,
        }
    }

    /// Attach an external scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Override the learned-pattern confidence floor.
    pub fn with_pattern_floor(mut self, floor: f64) -> Self {
        self.pattern_floor = floor;
        self
    }

    /// The stub table this engine routes against.
    pub fn store(&self) -> &StubStore {
        &self.store
    }

    /// Install learned patterns, replacing the active set atomically.
    ///
    /// Patterns with invalid regexes or targeting endpoints absent from
    /// the descriptor are skipped with a warning, never propagated.
    /// Returns the number of patterns activated.
    pub fn install_patterns(&self, patterns: Vec<LearnedPattern>) -> usize {
        let mut active = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let Some(stub) = self
                .store
                .get_by_endpoint(&pattern.api_pattern.method, &pattern.api_pattern.path)
            else {
                warn!(
                    method = %pattern.api_pattern.method,
                    path = %pattern.api_pattern.path,
                    "skipping learned pattern for unknown endpoint"
                );
                continue;
            };
            match ActivePattern::compile(pattern, &stub.name, stub.input_schema.clone()) {
                Ok(compiled) => active.push(compiled),
                Err(e) => warn!(error = %e, "skipping unloadable learned pattern"),
            }
        }
        active.sort_by(|a, b| {
            b.pattern
                .confidence
                .partial_cmp(&a.pattern.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let count = active.len();
        *self.learned.write().unwrap() = Arc::new(active);
        debug!(patterns = count, "learned pattern set installed");
        count
    }

    /// Drop every active learned pattern.
    pub fn clear_patterns(&self) {
        *self.learned.write().unwrap() = Arc::new(Vec::new());
    }

    /// Number of active learned patterns.
    pub fn active_pattern_count(&self) -> usize {
        self.learned.read().unwrap().len()
    }

    /// The active learned patterns, for stub export.
    pub fn active_patterns(&self) -> Vec<LearnedPattern> {
        self.learned
            .read()
            .unwrap()
            .iter()
            .map(|a| a.pattern.clone())
            .collect()
    }

    /// Route free text to an endpoint.
    pub fn route(&self, text: &str) -> RouteResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RouteResult::unmatched("empty input");
        }
        let canonical = trimmed.to_lowercase();

        if let Some(outcome) = self.route_learned(&canonical) {
            return self.finish(&canonical, outcome);
        }

        let mut candidates: Vec<MatchOutcome> = self
            .heuristics
            .iter()
            .filter_map(|m| m.matches(&canonical))
            .collect();
        if candidates.is_empty() {
            return RouteResult::unmatched("no matching endpoints");
        }

        if let Some(scorer) = &self.scorer {
            for candidate in &mut candidates {
                boost(scorer.as_ref(), &canonical, candidate);
            }
        }
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.observations.cmp(&a.observations))
        });
        let best = candidates.swap_remove(0);
        self.finish(&canonical, best)
    }

    /// First learned pattern (highest confidence first) matching at or
    /// above the floor.
    fn route_learned(&self, canonical: &str) -> Option<MatchOutcome> {
        let snapshot = Arc::clone(&self.learned.read().unwrap());
        for active in snapshot.iter() {
            if active.pattern.confidence < self.pattern_floor {
                break;
            }
            if let Some(mut outcome) = active.matches(canonical) {
                if let Some(scorer) = &self.scorer {
                    boost(scorer.as_ref(), canonical, &mut outcome);
                }
                return Some(outcome);
            }
        }
        None
    }

    fn finish(&self, canonical: &str, outcome: MatchOutcome) -> RouteResult {
        let decision = self.policy.decide(outcome.confidence);
        debug!(
            endpoint = %outcome.endpoint,
            confidence = outcome.confidence,
            decision = %decision,
            text = canonical,
            "routed"
        );
        RouteResult {
            endpoint: outcome.endpoint,
            method: outcome.method,
            path: outcome.path,
            args: outcome.args,
            confidence: outcome.confidence,
            decision,
            reasoning: Some(outcome.reasoning),
            matched_pattern: outcome.matched_pattern,
        }
    }
}

/// Combine a scorer opinion into a candidate. The blend only ever
/// raises confidence: the engine's own ordering stays the floor.
fn boost(scorer: &dyn Scorer, text: &str, candidate: &mut MatchOutcome) {
    let probe = ScoreCandidate {
        endpoint: candidate.endpoint.clone(),
        method: candidate.method.clone(),
        path: candidate.path.clone(),
        confidence: candidate.confidence,
        observations: candidate.observations,
    };
    if let Some(score) = scorer.score(text, &probe) {
        let combined = (candidate.confidence * 0.6 + score.clamp(0.0, 1.0) * 0.4).min(1.0);
        candidate.confidence = candidate.confidence.max(combined);
    }
}

/// Compile heuristic matchers for every stub: one per generated regex
/// pattern, plus a keyword matcher and an action matcher.
fn build_heuristics(store: &StubStore) -> Vec<Matcher> {
    let mut matchers = Vec::new();
    for stub in store.all() {
        let target = MatchTarget {
            endpoint: stub.name.clone(),
            method: stub.method.clone(),
            path: stub.path.clone(),
            input_schema: stub.input_schema.clone(),
        };

        for source in &stub.patterns {
            match Regex::new(&format!("(?i){source}")) {
                Ok(regex) => matchers.push(Matcher::Pattern {
                    target: target.clone(),
                    source: source.clone(),
                    regex,
                }),
                Err(e) => warn!(pattern = %source, error = %e, "unusable generated pattern"),
            }
        }

        if !stub.keywords.is_empty() {
            matchers.push(Matcher::Keyword {
                target: target.clone(),
                keywords: stub.keywords.clone(),
            });
        }

        if let Some(resource) = resource_from_path(&stub.path) {
            matchers.push(Matcher::Action { target, resource });
        }
    }
    matchers
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockagent_core::{ApiPattern, Decision, Descriptor};
    use std::collections::BTreeMap;

    fn engine() -> RulesEngine {
        engine_with(Policy::default())
    }

    fn engine_with(policy: Policy) -> RulesEngine {
        let descriptor: Descriptor = serde_json::from_value(serde_json::json!({
            "name": "todo-api",
            "base_url": "http://localhost:8000",
            "endpoints": [
                {"path": "/todo", "method": "POST", "summary": "Create a todo"},
                {"path": "/todo", "method": "GET", "summary": "List todos"},
                {"path": "/todo/{id}", "method": "DELETE", "summary": "Delete a todo"}
            ],
            "schema": {
                "/todo": {"request": {
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }}
            }
        }))
        .unwrap();
        let store = Arc::new(StubStore::from_descriptor(&descriptor));
        RulesEngine::new(store, policy)
    }

    fn learned(confidence: f64) -> LearnedPattern {
        LearnedPattern {
            intent_pattern: r".*(create|add|new).*todo.*".into(),
            api_pattern: ApiPattern {
                method: "POST".into(),
                path: "/todo".into(),
                extract_params: BTreeMap::from([(
                    "text".into(),
                    crate::extract::HINT_AFTER_COLON.into(),
                )]),
            },
            confidence,
            observations: 5,
        }
    }

    #[test]
    fn empty_input_is_fallback() {
        let result = engine().route("   ");
        assert_eq!(result.decision, Decision::Fallback);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn unroutable_text_is_fallback() {
        let result = engine().route("what is the meaning of life");
        assert_eq!(result.endpoint, "unknown");
        assert_eq!(result.decision, Decision::Fallback);
    }

    #[test]
    fn heuristics_route_create_intent() {
        let result = engine().route("create a new todo");
        assert_eq!(result.endpoint, "post_todo");
        assert_eq!(result.method, "POST");
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn learned_pattern_takes_precedence_and_extracts() {
        let engine = engine();
        engine.install_patterns(vec![learned(1.0)]);

        let result = engine.route("Create a todo: buy milk");
        assert_eq!(result.endpoint, "post_todo");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.decision, Decision::Direct);
        assert!(result.matched_pattern.is_some());
        assert_eq!(result.args.get("text"), Some(&serde_json::json!("buy milk")));
    }

    #[test]
    fn low_confidence_pattern_stays_below_floor() {
        let engine = engine();
        engine.install_patterns(vec![learned(0.3)]);

        // Pattern would match but sits below the floor, so heuristics run
        // and nothing claims a matched_pattern.
        let result = engine.route("create a todo: buy milk");
        assert!(result.matched_pattern.is_none());
    }

    #[test]
    fn install_skips_bad_and_unknown_patterns() {
        let engine = engine();
        let mut bad_regex = learned(0.9);
        bad_regex.intent_pattern = "(unclosed".into();
        let mut unknown_endpoint = learned(0.9);
        unknown_endpoint.api_pattern.path = "/missing".into();

        let installed =
            engine.install_patterns(vec![learned(0.9), bad_regex, unknown_endpoint]);
        assert_eq!(installed, 1);
        assert_eq!(engine.active_pattern_count(), 1);
    }

    #[test]
    fn install_replaces_previous_set() {
        let engine = engine();
        engine.install_patterns(vec![learned(0.9)]);
        engine.install_patterns(vec![]);
        assert_eq!(engine.active_pattern_count(), 0);

        let result = engine.route("create a todo: buy milk");
        assert!(result.matched_pattern.is_none());
    }

    #[test]
    fn policy_thresholds_classify_decisions() {
        let engine = engine();
        engine.install_patterns(vec![learned(0.75)]);
        let result = engine.route("add a todo: water plants");
        // 0.70 <= 0.75 < 0.88 under the default policy.
        assert_eq!(result.decision, Decision::Confirm);
    }

    struct FixedScorer(f64);
    impl Scorer for FixedScorer {
        fn score(&self, _text: &str, _candidate: &ScoreCandidate) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn scorer_boosts_but_never_demotes() {
        let plain = engine().route("create a new todo");
        let boosted = engine()
            .with_scorer(Arc::new(FixedScorer(1.0)))
            .route("create a new todo");
        let hostile = engine()
            .with_scorer(Arc::new(FixedScorer(0.0)))
            .route("create a new todo");

        assert!(boosted.confidence >= plain.confidence);
        assert!(hostile.confidence >= plain.confidence);
    }

    #[test]
    fn delete_intent_routes_to_delete_endpoint() {
        let result = engine().route("delete todo 7");
        assert_eq!(result.endpoint, "delete_todo_by_id");
        assert_eq!(result.method, "DELETE");
    }
}
