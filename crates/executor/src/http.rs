//! Single-call HTTP execution.

use sockagent_core::{ApiResult, ExecutionError};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Auth material substituted into `${...}` header placeholders.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub token: Option<String>,
    pub api_key: Option<String>,
    pub credentials: Option<String>,
}

impl AuthContext {
    /// Resolve placeholders in one header value. Headers whose
    /// placeholder has no configured material are dropped by the caller.
    fn resolve(&self, value: &str) -> Option<String> {
        let mut resolved = value.to_string();
        for (placeholder, material) in [
            ("${token}", &self.token),
            ("${api_key}", &self.api_key),
            ("${credentials}", &self.credentials),
        ] {
            if resolved.contains(placeholder) {
                match material {
                    Some(m) => resolved = resolved.replace(placeholder, m),
                    None => return None,
                }
            }
        }
        Some(resolved)
    }
}

/// Executes resolved API calls.
///
/// Execution never returns `Err`: timeouts, network failures, and
/// non-2xx responses all surface as a failed [`ApiResult`] so one bad
/// call cannot poison a batch or a routing loop.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    auth: AuthContext,
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            auth: AuthContext::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    /// Execute one call against an absolute URL.
    ///
    /// Arguments fill `{param}` path placeholders first; what remains
    /// becomes the query string (GET/DELETE) or the JSON body
    /// (POST/PUT/PATCH). An explicit `body` overrides args-as-body.
    pub async fn execute(
        &self,
        method: &str,
        url: &str,
        args: &BTreeMap<String, serde_json::Value>,
        body: Option<&serde_json::Value>,
        headers: &HashMap<String, String>,
    ) -> ApiResult {
        let started = Instant::now();
        let (url, remaining) = merge_path_params(url, args);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = self.build_request(method, &url, &remaining, body, headers);
            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.json::<serde_json::Value>().await.ok();
                    let duration = started.elapsed().as_secs_f64() * 1000.0;
                    debug!(method, url = %url, status, duration_ms = duration, "call finished");
                    return ApiResult::from_status(status, body, duration);
                }
                Err(e) if e.is_timeout() => {
                    let err = ExecutionError::Timeout {
                        url: url.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    };
                    warn!(method, url = %url, "call timed out");
                    return ApiResult::failure(
                        err.to_string(),
                        started.elapsed().as_secs_f64() * 1000.0,
                    );
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(method, url = %url, attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    let err = ExecutionError::Network(e.to_string());
                    return ApiResult::failure(
                        err.to_string(),
                        started.elapsed().as_secs_f64() * 1000.0,
                    );
                }
            }
        }
    }

    fn build_request(
        &self,
        method: &str,
        url: &str,
        remaining: &BTreeMap<String, serde_json::Value>,
        body: Option<&serde_json::Value>,
        headers: &HashMap<String, String>,
    ) -> reqwest::RequestBuilder {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::GET);
        let is_query_style = matches!(method, reqwest::Method::GET | reqwest::Method::DELETE);
        let mut request = self.client.request(method, url).timeout(self.timeout);

        for (name, value) in headers {
            match self.auth.resolve(value) {
                Some(resolved) => request = request.header(name, resolved),
                None => debug!(header = %name, "dropping header with unresolved auth placeholder"),
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        } else if is_query_style {
            let query: Vec<(String, String)> = remaining
                .iter()
                .map(|(k, v)| (k.clone(), query_value(v)))
                .collect();
            if !query.is_empty() {
                request = request.query(&query);
            }
        } else if !remaining.is_empty() {
            request = request.json(remaining);
        }

        request
    }
}

/// Substitute `{param}` placeholders in a URL from the argument map,
/// returning the filled URL and the unused arguments.
pub fn merge_path_params(
    url: &str,
    args: &BTreeMap<String, serde_json::Value>,
) -> (String, BTreeMap<String, serde_json::Value>) {
    let mut url = url.to_string();
    let mut remaining = BTreeMap::new();
    for (name, value) in args {
        let placeholder = format!("{{{name}}}");
        if url.contains(&placeholder) {
            url = url.replace(&placeholder, &query_value(value));
        } else {
            remaining.insert(name.clone(), value.clone());
        }
    }
    (url, remaining)
}

fn query_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
