//! Descriptor discovery — fetches and validates the machine-readable API
//! descriptor a socket-agent service publishes.
//!
//! Descriptors are fetched from `<base_url>/.well-known/socket-agent`,
//! size-checked (soft target 3KB, configurable hard cap), parsed, and
//! validated before the client ever routes against them.

use sockagent_core::{Descriptor, DiscoveryError};
use std::time::Duration;
use tracing::{debug, warn};

/// Well-known path the descriptor is served from.
pub const WELL_KNOWN_PATH: &str = "/.well-known/socket-agent";

/// Hard size cap in bytes — parsing beyond this fails discovery.
pub const MAX_SIZE_BYTES: usize = 8 * 1024;

/// Recommended size in bytes — exceeding this only logs a warning.
pub const RECOMMENDED_SIZE_BYTES: usize = 3 * 1024;

/// Fetches and validates socket-agent descriptors.
pub struct DescriptorFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl DescriptorFetcher {
    /// Create a fetcher with the default 30s timeout and 8KB hard cap.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            max_bytes: MAX_SIZE_BYTES,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the hard descriptor size cap.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Fetch and validate the descriptor published by `service_url`.
    pub async fn fetch(&self, service_url: &str) -> Result<Descriptor, DiscoveryError> {
        let service_url = normalize_url(service_url)?;
        let descriptor_url = format!("{service_url}{WELL_KNOWN_PATH}");
        debug!(url = %descriptor_url, "Fetching descriptor");

        let response = self
            .client
            .get(&descriptor_url)
            .header("Accept", "application/json")
            .header("User-Agent", "sockagent/0.1")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(DiscoveryError::NotFound {
                url: descriptor_url,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        if bytes.len() > self.max_bytes {
            return Err(DiscoveryError::TooLarge {
                size_bytes: bytes.len(),
                max_bytes: self.max_bytes,
            });
        }
        if bytes.len() > RECOMMENDED_SIZE_BYTES {
            warn!(
                size_bytes = bytes.len(),
                recommended = RECOMMENDED_SIZE_BYTES,
                "Descriptor exceeds recommended size"
            );
        }

        let mut value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| DiscoveryError::InvalidJson(e.to_string()))?;

        // Default base_url to the service URL when the server omits it.
        let base_missing = value
            .get("base_url")
            .and_then(|v| v.as_str())
            .map(str::is_empty)
            .unwrap_or(true);
        if base_missing {
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "base_url".into(),
                    serde_json::Value::String(service_url.clone()),
                );
            }
        }

        let descriptor: Descriptor = serde_json::from_value(value)
            .map_err(|e| DiscoveryError::Invalid(e.to_string()))?;

        validate_descriptor(&descriptor)?;
        Ok(descriptor)
    }
}

impl Default for DescriptorFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a service URL: default scheme, strip trailing slash, require
/// a host.
pub fn normalize_url(url: &str) -> Result<String, DiscoveryError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DiscoveryError::InvalidUrl("empty URL".into()));
    }

    let with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    let rest = with_scheme
        .strip_prefix("https://")
        .or_else(|| with_scheme.strip_prefix("http://"))
        .unwrap_or("");
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(DiscoveryError::InvalidUrl(url.to_string()));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// Structural validation beyond what serde enforces.
pub fn validate_descriptor(descriptor: &Descriptor) -> Result<(), DiscoveryError> {
    if descriptor.name.is_empty() {
        return Err(DiscoveryError::Invalid(
            "descriptor missing required field: name".into(),
        ));
    }
    if descriptor.endpoints.is_empty() {
        return Err(DiscoveryError::Invalid("descriptor has no endpoints".into()));
    }

    let mut seen = std::collections::HashSet::new();
    for endpoint in &descriptor.endpoints {
        if endpoint.path.is_empty() {
            return Err(DiscoveryError::Invalid(format!(
                "endpoint missing path ({} ...)",
                endpoint.method
            )));
        }
        if !matches!(
            endpoint.method.as_str(),
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH"
        ) {
            return Err(DiscoveryError::Invalid(format!(
                "invalid HTTP method '{}' for {}",
                endpoint.method, endpoint.path
            )));
        }
        if !seen.insert(endpoint.key()) {
            return Err(DiscoveryError::Invalid(format!(
                "duplicate endpoint: {}",
                endpoint.key()
            )));
        }
    }

    for (path, schema) in &descriptor.schemas {
        for (kind, value) in schema {
            if !value.is_object() {
                return Err(DiscoveryError::Invalid(format!(
                    "invalid {kind} schema for {path}: must be an object"
                )));
            }
            if value.get("type").is_none() {
                warn!(path, kind, "Schema missing 'type' field");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    fn descriptor_json() -> serde_json::Value {
        serde_json::json!({
            "name": "todo-api",
            "description": "A minimal todo service",
            "base_url": "",
            "endpoints": [
                {"path": "/todo", "method": "POST", "summary": "Create a todo"},
                {"path": "/todo", "method": "GET", "summary": "List todos"}
            ],
            "schema": {
                "/todo": {"request": {"type": "object"}}
            },
            "examples": ["create a todo: buy milk"]
        })
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn normalize_url_handles_schemes_and_slashes() {
        assert_eq!(
            normalize_url("example.com").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_url("http://example.com/").unwrap(),
            "http://example.com"
        );
        assert!(normalize_url("").is_err());
        assert!(normalize_url("https:///nohost").is_err());
    }

    #[test]
    fn validation_rejects_bad_descriptors() {
        let mut d: Descriptor = serde_json::from_value(descriptor_json()).unwrap();
        d.base_url = "http://localhost".into();
        assert!(validate_descriptor(&d).is_ok());

        let mut no_name = d.clone();
        no_name.name.clear();
        assert!(validate_descriptor(&no_name).is_err());

        let mut no_endpoints = d.clone();
        no_endpoints.endpoints.clear();
        assert!(validate_descriptor(&no_endpoints).is_err());

        let mut bad_method = d.clone();
        bad_method.endpoints[0].method = "FETCH".into();
        assert!(validate_descriptor(&bad_method).is_err());

        let mut dup = d.clone();
        let first = dup.endpoints[0].clone();
        dup.endpoints.push(first);
        assert!(validate_descriptor(&dup).is_err());
    }

    #[tokio::test]
    async fn fetch_parses_and_defaults_base_url() {
        let router = Router::new().route(
            "/.well-known/socket-agent",
            get(|| async { axum::Json(descriptor_json()) }),
        );
        let base = serve(router).await;

        let descriptor = DescriptorFetcher::new().fetch(&base).await.unwrap();
        assert_eq!(descriptor.name, "todo-api");
        // Empty base_url in the payload is replaced with the service URL.
        assert_eq!(descriptor.base_url, base);
        assert_eq!(descriptor.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn fetch_missing_descriptor_is_not_found() {
        let base = serve(Router::new()).await;
        let err = DescriptorFetcher::new().fetch(&base).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_descriptor_fails_hard_cap() {
        let router = Router::new().route(
            "/.well-known/socket-agent",
            get(|| async {
                let mut v = descriptor_json();
                v["description"] = serde_json::json!("x".repeat(16 * 1024));
                axum::Json(v)
            }),
        );
        let base = serve(router).await;

        let err = DescriptorFetcher::new().fetch(&base).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn descriptor_between_soft_and_hard_cap_is_accepted() {
        let router = Router::new().route(
            "/.well-known/socket-agent",
            get(|| async {
                let mut v = descriptor_json();
                // ~4KB: over the 3KB soft target, under the 8KB hard cap.
                v["description"] = serde_json::json!("x".repeat(4 * 1024));
                axum::Json(v)
            }),
        );
        let base = serve(router).await;

        let descriptor = DescriptorFetcher::new().fetch(&base).await.unwrap();
        assert_eq!(descriptor.name, "todo-api");
    }

    #[tokio::test]
    async fn malformed_json_is_discovery_error() {
        let router = Router::new().route(
            "/.well-known/socket-agent",
            get(|| async { "not json at all" }),
        );
        let base = serve(router).await;

        let err = DescriptorFetcher::new().fetch(&base).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        // Port 1 is essentially never listening.
        let err = DescriptorFetcher::new()
            .with_timeout(Duration::from_millis(500))
            .fetch("http://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Network(_)));
    }
}
