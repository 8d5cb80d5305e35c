//! Learned patterns, observations, and the portable stub artifact.
//!
//! A `StubFile` is a frozen snapshot of learned routing patterns that can
//! be shipped between clients so a fresh client routes confidently without
//! re-learning. Serialization is lossless: the intent matcher is stored as
//! its literal source pattern, never a compiled form.

use crate::call::{ApiCall, ApiResult};
use crate::error::StubFormatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current stub artifact format version.
pub const STUB_FORMAT_VERSION: &str = "1.0";

/// Extraction hint: the value is everything after the first colon.
pub const HINT_AFTER_COLON: &str = "text after colon";
/// Extraction hint: the value is the text left after stripping leading
/// action words, articles, and the resource noun.
pub const HINT_AFTER_ACTION: &str = "text after action words";
/// Extraction hint: no stable shape was found; fall back to schema forms.
pub const HINT_FROM_INTENT: &str = "extract from intent";

/// One recorded (intent, call, result) interaction used for pattern mining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// The caller's free-text intent.
    pub intent: String,
    /// The API call that was made.
    pub call: ApiCall,
    /// What came back.
    pub result: ApiResult,
    /// When the interaction was observed.
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(intent: impl Into<String>, call: ApiCall, result: ApiResult) -> Self {
        Self {
            intent: intent.into(),
            call,
            result,
            observed_at: Utc::now(),
        }
    }
}

/// The call-shape side of a learned pattern: which endpoint to hit and how
/// to pull parameters out of the intent text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiPattern {
    /// HTTP method.
    pub method: String,
    /// Endpoint path.
    pub path: String,
    /// Per-parameter extraction hints (parameter name → hint).
    #[serde(default)]
    pub extract_params: BTreeMap<String, String>,
}

/// A text→call mapping mined from recurring observations.
///
/// `confidence` and `observations` update as matching observations accrue;
/// the matcher itself (`intent_pattern`) is replaced, not edited in place,
/// when re-mined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearnedPattern {
    /// Regex source matching the intent text. Stored literally so the
    /// artifact round-trips without loss.
    pub intent_pattern: String,
    /// The call shape to produce on a match.
    pub api_pattern: ApiPattern,
    /// Agreement-derived confidence in 0..=1.
    pub confidence: f64,
    /// Number of observations backing this pattern.
    pub observations: u64,
}

/// A portable, frozen snapshot of learned patterns.
///
/// Once exported, a stub is detached: loading it never merges with a live
/// learner's state unless explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubFile {
    /// Artifact format version.
    pub version: String,
    /// URL of the descriptor the patterns were learned against.
    pub source: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Patterns ordered by descending confidence.
    pub learned_patterns: Vec<LearnedPattern>,
    /// Free-form provenance metadata (call counts, unique intents, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StubFile {
    /// Write the artifact as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), StubFormatError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StubFormatError::Malformed(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| StubFormatError::Io(e.to_string()))
    }

    /// Read and validate an artifact. Rejects unsupported versions.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, StubFormatError> {
        let raw = std::fs::read_to_string(path).map_err(|e| StubFormatError::Io(e.to_string()))?;
        let stub: Self =
            serde_json::from_str(&raw).map_err(|e| StubFormatError::Malformed(e.to_string()))?;
        if stub.version != STUB_FORMAT_VERSION {
            return Err(StubFormatError::VersionMismatch {
                found: stub.version,
                expected: STUB_FORMAT_VERSION.into(),
            });
        }
        Ok(stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pattern() -> LearnedPattern {
        LearnedPattern {
            intent_pattern: r".*(create|add|new).*todo.*".into(),
            api_pattern: ApiPattern {
                method: "POST".into(),
                path: "/todo".into(),
                extract_params: BTreeMap::from([(
                    "text".into(),
                    "text after action words".into(),
                )]),
            },
            confidence: 0.95,
            observations: 47,
        }
    }

    #[test]
    fn stub_file_serialization_is_lossless() {
        let stub = StubFile {
            version: STUB_FORMAT_VERSION.into(),
            source: "http://localhost:8000".into(),
            created_at: Utc::now(),
            learned_patterns: vec![sample_pattern()],
            metadata: BTreeMap::from([("total_calls".into(), serde_json::json!(47))]),
        };

        let json = serde_json::to_string_pretty(&stub).unwrap();
        let roundtrip: StubFile = serde_json::from_str(&json).unwrap();

        assert_eq!(roundtrip.version, stub.version);
        assert_eq!(roundtrip.source, stub.source);
        assert_eq!(roundtrip.learned_patterns, stub.learned_patterns);
        // The matcher survives as its literal source pattern.
        assert_eq!(
            roundtrip.learned_patterns[0].intent_pattern,
            r".*(create|add|new).*todo.*"
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.stub.json");
        let stub = StubFile {
            version: STUB_FORMAT_VERSION.into(),
            source: "http://localhost:8000".into(),
            created_at: Utc::now(),
            learned_patterns: vec![sample_pattern()],
            metadata: BTreeMap::new(),
        };

        stub.save(&path).unwrap();
        let loaded = StubFile::load(&path).unwrap();
        assert_eq!(loaded.learned_patterns, stub.learned_patterns);
        assert_eq!(loaded.source, stub.source);
    }

    #[test]
    fn load_rejects_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.stub.json");
        let stub = StubFile {
            version: "9.0".into(),
            source: "http://localhost:8000".into(),
            created_at: Utc::now(),
            learned_patterns: vec![],
            metadata: BTreeMap::new(),
        };
        stub.save(&path).unwrap();

        let err = StubFile::load(&path).unwrap_err();
        assert!(matches!(err, StubFormatError::VersionMismatch { .. }));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.stub.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            StubFile::load(&path).unwrap_err(),
            StubFormatError::Malformed(_)
        ));
    }

    #[test]
    fn observation_carries_timestamp() {
        let call = ApiCall::new("POST", "/todo");
        let result = ApiResult::from_status(201, None, 5.0);
        let obs = Observation::new("create a todo: buy milk", call, result);
        assert_eq!(obs.intent, "create a todo: buy milk");
        assert!(obs.observed_at <= Utc::now());
    }
}
