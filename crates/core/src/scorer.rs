//! Optional scoring and embedding capabilities.
//!
//! Both are injected enhancements with no-op/absent defaults — core
//! routing and caching must function with them entirely missing.

/// A routing candidate offered to a scorer for re-ranking.
#[derive(Debug, Clone)]
pub struct ScoreCandidate {
    /// Stub/endpoint name.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Endpoint path.
    pub path: String,
    /// Confidence assigned by the rules engine.
    pub confidence: f64,
    /// Observation count backing the candidate (0 for heuristic matches).
    pub observations: u64,
}

/// An external confidence scorer (e.g. a tiny classifier model).
///
/// The router combines a scorer's output with its own confidence; the
/// scorer may boost or dampen a candidate but never fully overrides the
/// floor-confidence ordering.
pub trait Scorer: Send + Sync {
    /// Score a candidate for the given text, in 0..=1.
    /// `None` means the scorer has no opinion.
    fn score(&self, text: &str, candidate: &ScoreCandidate) -> Option<f64>;
}

/// The default scorer: never has an opinion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScorer;

impl Scorer for NoopScorer {
    fn score(&self, _text: &str, _candidate: &ScoreCandidate) -> Option<f64> {
        None
    }
}

/// A text embedder backing the optional semantic cache layer.
pub trait Embedder: Send + Sync {
    /// Embed a text into a dense vector.
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_scorer_has_no_opinion() {
        let candidate = ScoreCandidate {
            endpoint: "post_todo".into(),
            method: "POST".into(),
            path: "/todo".into(),
            confidence: 0.9,
            observations: 5,
        };
        assert!(NoopScorer.score("create a todo", &candidate).is_none());
    }
}
