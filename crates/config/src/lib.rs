//! Policy configuration for the sockagent client.
//!
//! A `Policy` holds the decision thresholds and cache/telemetry knobs.
//! Policies load from TOML files with environment variable overrides, and
//! named presets supply defaults only — explicit overrides always win.

use serde::{Deserialize, Serialize};
use sockagent_core::{Decision, Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Client policy: thresholds, cache, learning, and telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    /// Confidence at or above which a call is short-circuited directly.
    #[serde(default = "default_short_circuit_threshold")]
    pub short_circuit_threshold: f64,

    /// Confidence at or above which (but below short-circuit) the caller
    /// is asked to confirm.
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: f64,

    /// Default cache TTL in seconds when no endpoint hint applies.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_default: u64,

    /// Whether the similarity-based cache layer is consulted.
    #[serde(default)]
    pub enable_semantic_cache: bool,

    /// Cosine similarity threshold for semantic cache hits.
    #[serde(default = "default_semantic_radius")]
    pub semantic_cache_radius: f64,

    /// Maximum entries in the exact cache before LRU eviction.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Whether observed calls feed the pattern learner.
    #[serde(default)]
    pub enable_learning: bool,

    /// Whether telemetry is collected.
    #[serde(default = "default_true")]
    pub telemetry_enabled: bool,

    /// Telemetry export interval in seconds.
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_export_interval: u64,

    /// Estimated tokens one LLM-fallback call costs; drives the
    /// tokens-saved heuristic.
    #[serde(default = "default_fallback_token_cost")]
    pub fallback_token_cost: u64,

    /// Per-endpoint TTL overrides (stub name → seconds). Takes precedence
    /// over the descriptor's cache hints and the default.
    #[serde(default)]
    pub endpoint_ttls: HashMap<String, u64>,
}

fn default_short_circuit_threshold() -> f64 {
    0.88
}
fn default_confirm_threshold() -> f64 {
    0.70
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_semantic_radius() -> f64 {
    0.85
}
fn default_max_cache_entries() -> usize {
    1000
}
fn default_telemetry_interval() -> u64 {
    300
}
fn default_fallback_token_cost() -> u64 {
    500
}
fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            short_circuit_threshold: default_short_circuit_threshold(),
            confirm_threshold: default_confirm_threshold(),
            cache_ttl_default: default_cache_ttl(),
            enable_semantic_cache: false,
            semantic_cache_radius: default_semantic_radius(),
            max_cache_entries: default_max_cache_entries(),
            enable_learning: false,
            telemetry_enabled: true,
            telemetry_export_interval: default_telemetry_interval(),
            fallback_token_cost: default_fallback_token_cost(),
            endpoint_ttls: HashMap::new(),
        }
    }
}

impl Policy {
    /// Classify a routed confidence.
    ///
    /// `c >= short_circuit_threshold → Direct`;
    /// `confirm_threshold <= c < short_circuit_threshold → Confirm`;
    /// otherwise `Fallback`. Monotone in `confidence` for fixed thresholds.
    pub fn decide(&self, confidence: f64) -> Decision {
        if confidence >= self.short_circuit_threshold {
            Decision::Direct
        } else if confidence >= self.confirm_threshold {
            Decision::Confirm
        } else {
            Decision::Fallback
        }
    }

    /// Resolve the cache TTL for an endpoint.
    ///
    /// Precedence: explicit endpoint override, then the descriptor's
    /// cache hint, then the policy default.
    pub fn ttl_for(&self, endpoint: &str, descriptor_hint: Option<u64>) -> Duration {
        if let Some(secs) = self.endpoint_ttls.get(endpoint) {
            return Duration::from_secs(*secs);
        }
        if let Some(secs) = descriptor_hint {
            return Duration::from_secs(secs);
        }
        Duration::from_secs(self.cache_ttl_default)
    }

    /// Validate threshold invariants.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("short_circuit_threshold", self.short_circuit_threshold),
            ("confirm_threshold", self.confirm_threshold),
            ("semantic_cache_radius", self.semantic_cache_radius),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config {
                    message: format!("{name} must be in 0..=1, got {value}"),
                });
            }
        }
        if self.confirm_threshold > self.short_circuit_threshold {
            return Err(Error::Config {
                message: format!(
                    "confirm_threshold ({}) must not exceed short_circuit_threshold ({})",
                    self.confirm_threshold, self.short_circuit_threshold
                ),
            });
        }
        Ok(())
    }

    /// Load a policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.as_ref().display()),
        })?;
        let policy: Policy = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid policy file: {e}"),
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Save this policy to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("failed to serialize policy: {e}"),
        })?;
        std::fs::write(path.as_ref(), raw).map_err(|e| Error::Config {
            message: format!("failed to write {}: {e}", path.as_ref().display()),
        })
    }

    /// Apply environment variable overrides on top of this policy.
    ///
    /// Recognized keys: `SOCKET_AGENT_SHORT_CIRCUIT_THRESHOLD`,
    /// `SOCKET_AGENT_CONFIRM_THRESHOLD`, `SOCKET_AGENT_CACHE_TTL`,
    /// `SOCKET_AGENT_SEMANTIC_CACHE`, `SOCKET_AGENT_SEMANTIC_RADIUS`,
    /// `SOCKET_AGENT_LEARNING`, `SOCKET_AGENT_TELEMETRY`,
    /// `SOCKET_AGENT_TELEMETRY_INTERVAL`. Unparseable values are ignored
    /// with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        fn read<T: std::str::FromStr>(key: &str) -> Option<T> {
            let raw = std::env::var(key).ok()?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparseable env override");
                    None
                }
            }
        }
        fn read_bool(key: &str) -> Option<bool> {
            let raw = std::env::var(key).ok()?;
            Some(matches!(raw.to_lowercase().as_str(), "true" | "1" | "on" | "yes"))
        }

        if let Some(v) = read("SOCKET_AGENT_SHORT_CIRCUIT_THRESHOLD") {
            self.short_circuit_threshold = v;
        }
        if let Some(v) = read("SOCKET_AGENT_CONFIRM_THRESHOLD") {
            self.confirm_threshold = v;
        }
        if let Some(v) = read("SOCKET_AGENT_CACHE_TTL") {
            self.cache_ttl_default = v;
        }
        if let Some(v) = read_bool("SOCKET_AGENT_SEMANTIC_CACHE") {
            self.enable_semantic_cache = v;
        }
        if let Some(v) = read("SOCKET_AGENT_SEMANTIC_RADIUS") {
            self.semantic_cache_radius = v;
        }
        if let Some(v) = read_bool("SOCKET_AGENT_LEARNING") {
            self.enable_learning = v;
        }
        if let Some(v) = read_bool("SOCKET_AGENT_TELEMETRY") {
            self.telemetry_enabled = v;
        }
        if let Some(v) = read("SOCKET_AGENT_TELEMETRY_INTERVAL") {
            self.telemetry_export_interval = v;
        }
        self
    }

    /// Build a policy from environment variables over defaults.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

/// Named policy presets.
///
/// Presets supply *defaults only*; callers layer explicit overrides on
/// top (see [`create_policy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Maximize short-circuiting at the cost of occasional misroutes.
    Aggressive,
    /// The default trade-off.
    Balanced,
    /// Prioritize accuracy over savings.
    Conservative,
    /// Everything on, short TTLs, frequent exports.
    Development,
    /// Tuned for production embedding.
    Production,
}

impl Preset {
    /// Parse a preset name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "aggressive" => Some(Self::Aggressive),
            "balanced" => Some(Self::Balanced),
            "conservative" => Some(Self::Conservative),
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// The policy this preset defines.
    pub fn policy(self) -> Policy {
        match self {
            Self::Aggressive => Policy {
                short_circuit_threshold: 0.75,
                confirm_threshold: 0.60,
                cache_ttl_default: 600,
                enable_semantic_cache: true,
                semantic_cache_radius: 0.80,
                ..Policy::default()
            },
            Self::Balanced => Policy::default(),
            Self::Conservative => Policy {
                short_circuit_threshold: 0.95,
                confirm_threshold: 0.85,
                cache_ttl_default: 180,
                enable_semantic_cache: false,
                ..Policy::default()
            },
            Self::Development => Policy {
                short_circuit_threshold: 0.80,
                confirm_threshold: 0.60,
                cache_ttl_default: 60,
                enable_semantic_cache: true,
                semantic_cache_radius: 0.75,
                enable_learning: true,
                telemetry_enabled: true,
                telemetry_export_interval: 60,
                ..Policy::default()
            },
            Self::Production => Policy {
                short_circuit_threshold: 0.90,
                confirm_threshold: 0.75,
                cache_ttl_default: 300,
                enable_semantic_cache: false,
                enable_learning: false,
                telemetry_enabled: true,
                telemetry_export_interval: 3600,
                ..Policy::default()
            },
        }
    }
}

/// Create a policy from an optional preset plus explicit overrides.
///
/// Override keys mirror the policy field names; unknown keys fail with a
/// configuration error. Explicit values always beat preset defaults.
pub fn create_policy(
    preset: Option<Preset>,
    overrides: &HashMap<String, serde_json::Value>,
) -> Result<Policy> {
    let base = preset.map(Preset::policy).unwrap_or_default();

    // Merge overrides through the serde representation so field names and
    // types stay in one place.
    let mut value = serde_json::to_value(&base)?;
    let map = value
        .as_object_mut()
        .expect("policy serializes to an object");
    for (key, v) in overrides {
        if !map.contains_key(key) {
            return Err(Error::Config {
                message: format!("unknown policy option: {key}"),
            });
        }
        map.insert(key.clone(), v.clone());
    }

    let policy: Policy = serde_json::from_value(value)?;
    policy.validate()?;
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockagent_core::Decision;

    #[test]
    fn default_thresholds() {
        let p = Policy::default();
        assert!((p.short_circuit_threshold - 0.88).abs() < 1e-12);
        assert!((p.confirm_threshold - 0.70).abs() < 1e-12);
        assert_eq!(p.cache_ttl_default, 300);
        assert!(p.telemetry_enabled);
        assert!(!p.enable_learning);
    }

    #[test]
    fn decide_classifies_bands() {
        let p = Policy::default();
        assert_eq!(p.decide(0.95), Decision::Direct);
        assert_eq!(p.decide(0.88), Decision::Direct);
        assert_eq!(p.decide(0.80), Decision::Confirm);
        assert_eq!(p.decide(0.70), Decision::Confirm);
        assert_eq!(p.decide(0.50), Decision::Fallback);
        assert_eq!(p.decide(0.0), Decision::Fallback);
    }

    #[test]
    fn decide_is_monotone() {
        let p = Policy::default();
        let confidences = [0.0, 0.3, 0.69, 0.70, 0.71, 0.87, 0.88, 0.9, 1.0];
        for pair in confidences.windows(2) {
            assert!(p.decide(pair[0]) <= p.decide(pair[1]));
        }
    }

    #[test]
    fn ttl_resolution_precedence() {
        let mut p = Policy::default();
        p.endpoint_ttls.insert("list_todo".into(), 42);

        // Explicit override wins over everything.
        assert_eq!(p.ttl_for("list_todo", Some(900)), Duration::from_secs(42));
        // Descriptor hint beats the default.
        assert_eq!(p.ttl_for("other", Some(900)), Duration::from_secs(900));
        // Default as last resort.
        assert_eq!(p.ttl_for("other", None), Duration::from_secs(300));
    }

    #[test]
    fn presets_define_expected_defaults() {
        let aggressive = Preset::Aggressive.policy();
        assert!((aggressive.short_circuit_threshold - 0.75).abs() < 1e-12);
        assert!(aggressive.enable_semantic_cache);

        let conservative = Preset::Conservative.policy();
        assert!((conservative.short_circuit_threshold - 0.95).abs() < 1e-12);
        assert!(!conservative.enable_semantic_cache);

        let dev = Preset::Development.policy();
        assert!(dev.enable_learning);
        assert_eq!(dev.cache_ttl_default, 60);

        assert_eq!(Preset::Balanced.policy(), Policy::default());
    }

    #[test]
    fn preset_parse_accepts_aliases() {
        assert_eq!(Preset::parse("production"), Some(Preset::Production));
        assert_eq!(Preset::parse("prod"), Some(Preset::Production));
        assert_eq!(Preset::parse("DEV"), Some(Preset::Development));
        assert_eq!(Preset::parse("bogus"), None);
    }

    #[test]
    fn explicit_overrides_beat_preset_defaults() {
        let overrides = HashMap::from([
            ("short_circuit_threshold".to_string(), serde_json::json!(0.99)),
            ("cache_ttl_default".to_string(), serde_json::json!(5)),
        ]);
        let p = create_policy(Some(Preset::Aggressive), &overrides).unwrap();
        assert!((p.short_circuit_threshold - 0.99).abs() < 1e-12);
        assert_eq!(p.cache_ttl_default, 5);
        // Untouched preset defaults survive.
        assert!(p.enable_semantic_cache);
    }

    #[test]
    fn unknown_override_key_rejected() {
        let overrides = HashMap::from([("no_such_option".to_string(), serde_json::json!(1))]);
        let err = create_policy(None, &overrides).unwrap_err();
        assert!(err.to_string().contains("no_such_option"));
    }

    #[test]
    fn validation_rejects_inverted_thresholds() {
        let p = Policy {
            short_circuit_threshold: 0.5,
            confirm_threshold: 0.9,
            ..Policy::default()
        };
        assert!(p.validate().is_err());

        let p = Policy {
            short_circuit_threshold: 1.5,
            ..Policy::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_over_defaults() {
        // No other test reads these keys, so this stays race-free under
        // the parallel test runner.
        unsafe {
            std::env::set_var("SOCKET_AGENT_CONFIRM_THRESHOLD", "0.65");
            std::env::set_var("SOCKET_AGENT_LEARNING", "on");
            std::env::set_var("SOCKET_AGENT_CACHE_TTL", "not-a-number");
        }
        let p = Policy::from_env();
        unsafe {
            std::env::remove_var("SOCKET_AGENT_CONFIRM_THRESHOLD");
            std::env::remove_var("SOCKET_AGENT_LEARNING");
            std::env::remove_var("SOCKET_AGENT_CACHE_TTL");
        }

        assert!((p.confirm_threshold - 0.65).abs() < 1e-12);
        assert!(p.enable_learning);
        // Unparseable values are ignored, keeping the default.
        assert_eq!(p.cache_ttl_default, 300);
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");

        let mut p = Preset::Development.policy();
        p.endpoint_ttls.insert("list_todo".into(), 15);
        p.save(&path).unwrap();

        let loaded = Policy::load(&path).unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, "short_circuit_threshold = 3.0").unwrap();
        assert!(Policy::load(&path).is_err());
    }
}
