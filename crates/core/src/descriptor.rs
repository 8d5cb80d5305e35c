//! Descriptor model — the machine-readable API surface a socket-agent
//! service publishes at `/.well-known/socket-agent`.
//!
//! A descriptor is immutable once fetched; it is refreshed only by
//! re-running discovery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Information about a single API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointInfo {
    /// URL path (e.g. `/todo`, `/users/{id}`).
    pub path: String,
    /// HTTP method.
    pub method: String,
    /// Brief human-readable description.
    pub summary: String,
}

impl EndpointInfo {
    /// Canonical `METHOD:/path` identity used for grouping and indexing.
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }

    /// Whether the endpoint is safe/idempotent and therefore cacheable.
    pub fn is_safe(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD")
    }
}

/// A socket-agent API descriptor.
///
/// Soft size target is ~3KB on the wire, hard cap ~8KB; sizes are enforced
/// by the discovery layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// Service name.
    pub name: String,

    /// Service description.
    #[serde(default)]
    pub description: String,

    /// Base URL all endpoint paths are resolved against.
    pub base_url: String,

    /// Declared endpoints.
    pub endpoints: Vec<EndpointInfo>,

    /// Per-path request/response JSON Schemas, keyed by endpoint path.
    #[serde(default, alias = "schema")]
    pub schemas: HashMap<String, HashMap<String, serde_json::Value>>,

    /// Authentication descriptor (`{"type": "none" | "bearer" | "api_key" | "basic", ...}`).
    #[serde(default = "default_auth")]
    pub auth: HashMap<String, serde_json::Value>,

    /// Example natural-language phrases the service suggests.
    #[serde(default)]
    pub examples: Vec<String>,

    /// Per-path response rendering templates.
    #[serde(default)]
    pub response_templates: HashMap<String, String>,

    /// Per-path cache TTL hints in seconds.
    #[serde(default)]
    pub cache_hints: HashMap<String, u64>,

    /// Descriptor format version.
    #[serde(default = "default_spec_version", rename = "specVersion")]
    pub spec_version: String,
}

fn default_auth() -> HashMap<String, serde_json::Value> {
    let mut auth = HashMap::new();
    auth.insert("type".into(), serde_json::Value::String("none".into()));
    auth
}

fn default_spec_version() -> String {
    "2025-01-01".into()
}

impl Descriptor {
    /// Find an endpoint by method and path.
    pub fn endpoint(&self, method: &str, path: &str) -> Option<&EndpointInfo> {
        self.endpoints
            .iter()
            .find(|e| e.method == method && e.path == path)
    }

    /// The request schema declared for a path, if any.
    pub fn request_schema(&self, path: &str) -> Option<&serde_json::Value> {
        self.schemas.get(path).and_then(|s| s.get("request"))
    }

    /// The response schema declared for a path, if any.
    pub fn response_schema(&self, path: &str) -> Option<&serde_json::Value> {
        self.schemas.get(path).and_then(|s| s.get("response"))
    }

    /// The auth scheme type ("none" when unspecified).
    pub fn auth_type(&self) -> &str {
        self.auth
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("none")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_descriptor() -> Descriptor {
        serde_json::from_value(serde_json::json!({
            "name": "todo-api",
            "description": "A minimal todo service",
            "base_url": "http://localhost:8000",
            "endpoints": [
                {"path": "/todo", "method": "POST", "summary": "Create a todo"},
                {"path": "/todo", "method": "GET", "summary": "List todos"},
                {"path": "/todo/{id}", "method": "DELETE", "summary": "Delete a todo"}
            ],
            "schema": {
                "/todo": {
                    "request": {"type": "object", "properties": {"text": {"type": "string"}}}
                }
            },
            "examples": ["create a todo: buy milk"]
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_with_defaults() {
        let d = todo_descriptor();
        assert_eq!(d.name, "todo-api");
        assert_eq!(d.endpoints.len(), 3);
        assert_eq!(d.auth_type(), "none");
        assert_eq!(d.spec_version, "2025-01-01");
        assert!(d.cache_hints.is_empty());
    }

    #[test]
    fn schema_alias_accepted() {
        // The wire field is `schema`; internal name is `schemas`.
        let d = todo_descriptor();
        assert!(d.request_schema("/todo").is_some());
        assert!(d.response_schema("/todo").is_none());
    }

    #[test]
    fn endpoint_lookup_and_safety() {
        let d = todo_descriptor();
        let get = d.endpoint("GET", "/todo").unwrap();
        assert!(get.is_safe());
        let post = d.endpoint("POST", "/todo").unwrap();
        assert!(!post.is_safe());
        assert_eq!(post.key(), "POST:/todo");
        assert!(d.endpoint("PUT", "/todo").is_none());
    }
}
