//! API call and result value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a call was resolved: short-circuited by the router or delegated
/// to the external LLM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Via {
    /// Routed directly from learned patterns / heuristics.
    Direct,
    /// Delegated to the external LLM handler.
    Llm,
}

impl std::fmt::Display for Via {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// A resolved API call. Value object — no identity, argument order is
/// irrelevant (args are kept sorted).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiCall {
    /// HTTP method.
    pub method: String,
    /// Endpoint path (may contain `{param}` placeholders).
    pub path: String,
    /// Extracted/supplied arguments, sorted by key.
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,
    /// Optional explicit request body overriding args-as-body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// When the call was issued.
    pub timestamp: DateTime<Utc>,
}

impl ApiCall {
    /// Create a call with the current timestamp.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            args: BTreeMap::new(),
            body: None,
            timestamp: Utc::now(),
        }
    }

    /// Builder-style argument insertion.
    pub fn with_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    /// Canonical `METHOD:/path` identity.
    pub fn endpoint_key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

/// The outcome of one API call. Produced once, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResult {
    /// Whether the call succeeded (2xx/3xx status class).
    pub success: bool,
    /// HTTP status code (0 when the request never reached the server).
    pub status_code: u16,
    /// Parsed response body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Response rendered through the endpoint's template, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_text: Option<String>,
    /// Error description when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// LLM tokens consumed resolving this call (0 on the direct path).
    #[serde(default)]
    pub tokens_used: u64,
    /// Whether the result was served from cache.
    #[serde(default)]
    pub cache_hit: bool,
}

impl ApiResult {
    /// Build a result from an HTTP status and body; success is derived
    /// from the status class.
    pub fn from_status(status_code: u16, body: Option<serde_json::Value>, duration_ms: f64) -> Self {
        let success = (200..400).contains(&status_code);
        let error = if success {
            None
        } else {
            Some(extract_error_message(status_code, body.as_ref()))
        };
        Self {
            success,
            status_code,
            body,
            rendered_text: None,
            error,
            duration_ms,
            tokens_used: 0,
            cache_hit: false,
        }
    }

    /// Build a failed result for a call that never produced a response.
    pub fn failure(error: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            success: false,
            status_code: 0,
            body: None,
            rendered_text: None,
            error: Some(error.into()),
            duration_ms,
            tokens_used: 0,
            cache_hit: false,
        }
    }

    /// Copy of this result marked as a cache hit.
    pub fn as_cache_hit(mut self, duration_ms: f64) -> Self {
        self.cache_hit = true;
        self.duration_ms = duration_ms;
        self
    }
}

/// Pull a useful error message out of a failed response body.
fn extract_error_message(status_code: u16, body: Option<&serde_json::Value>) -> String {
    if let Some(body) = body {
        for key in ["error", "message", "detail"] {
            if let Some(msg) = body.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    format!("HTTP {status_code}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_derived_from_status_class() {
        assert!(ApiResult::from_status(200, None, 1.0).success);
        assert!(ApiResult::from_status(201, None, 1.0).success);
        assert!(ApiResult::from_status(302, None, 1.0).success);
        assert!(!ApiResult::from_status(404, None, 1.0).success);
        assert!(!ApiResult::from_status(500, None, 1.0).success);
    }

    #[test]
    fn error_message_extracted_from_body() {
        let body = serde_json::json!({"error": "no such todo"});
        let result = ApiResult::from_status(404, Some(body), 3.0);
        assert_eq!(result.error.as_deref(), Some("no such todo"));

        let bare = ApiResult::from_status(500, None, 3.0);
        assert_eq!(bare.error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn args_are_order_irrelevant() {
        let a = ApiCall::new("POST", "/todo")
            .with_arg("text", serde_json::json!("milk"))
            .with_arg("due", serde_json::json!("tomorrow"));
        let b = ApiCall::new("POST", "/todo")
            .with_arg("due", serde_json::json!("tomorrow"))
            .with_arg("text", serde_json::json!("milk"));
        assert_eq!(a.args, b.args);
        assert_eq!(a.endpoint_key(), "POST:/todo");
    }

    #[test]
    fn via_display() {
        assert_eq!(Via::Direct.to_string(), "direct");
        assert_eq!(Via::Llm.to_string(), "llm");
    }
}
