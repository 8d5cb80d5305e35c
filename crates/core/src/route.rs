//! Routing decision model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the policy decided for a routed confidence.
///
/// Ordered: `Fallback < Confirm < Direct`. The ordering is load-bearing —
/// for fixed thresholds, `decide` is monotone in confidence.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Low confidence — delegate to the external LLM.
    Fallback,
    /// Medium confidence — proceed, but callers may gate on confirmation.
    Confirm,
    /// High confidence — short-circuit straight to the API call.
    Direct,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fallback => write!(f, "fallback"),
            Self::Confirm => write!(f, "confirm"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// The result of routing one piece of free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    /// Resolved endpoint name (stub name), or "unknown".
    pub endpoint: String,
    /// HTTP method of the resolved endpoint (empty when unresolved).
    pub method: String,
    /// Path of the resolved endpoint (empty when unresolved).
    pub path: String,
    /// Arguments extracted from the text.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Confidence in 0..=1.
    pub confidence: f64,
    /// Policy decision for this confidence.
    pub decision: Decision,
    /// Human-readable explanation of why this route was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// The learned intent pattern that matched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

impl RouteResult {
    /// The no-match result: confidence 0, empty args, fallback.
    pub fn unmatched(reason: impl Into<String>) -> Self {
        Self {
            endpoint: "unknown".into(),
            method: String::new(),
            path: String::new(),
            args: BTreeMap::new(),
            confidence: 0.0,
            decision: Decision::Fallback,
            reasoning: Some(reason.into()),
            matched_pattern: None,
        }
    }
}
