//! Stub compilation — turning a descriptor into routable endpoint stubs.
//!
//! A `CompiledStub` is the immutable per-endpoint metadata the router
//! matches against: generated name, absolute URL, schemas, auth header
//! placeholders, keywords, and heuristic regex patterns. The whole table
//! is built once at startup from the descriptor.

use sockagent_core::{Descriptor, EndpointInfo};
use std::collections::HashMap;

/// Action verb families used for keyword and pattern generation.
pub(crate) const CREATE_VERBS: &[&str] = &[
    "create", "add", "new", "make", "build", "generate", "insert",
];
pub(crate) const READ_VERBS: &[&str] = &[
    "get", "list", "show", "fetch", "retrieve", "find", "search", "view",
];
pub(crate) const UPDATE_VERBS: &[&str] = &["update", "edit", "modify", "change", "set", "patch"];
pub(crate) const DELETE_VERBS: &[&str] = &["delete", "remove", "destroy", "clear", "purge"];

/// An endpoint compiled into routable form.
#[derive(Debug, Clone)]
pub struct CompiledStub {
    /// Generated stub name (e.g. `post_todo`, `fetch_users_by_id`).
    pub name: String,
    /// HTTP method.
    pub method: String,
    /// Absolute URL (base_url + path).
    pub url: String,
    /// Endpoint path (may contain `{param}` placeholders).
    pub path: String,
    /// Endpoint summary from the descriptor.
    pub summary: String,
    /// Request JSON Schema, if declared.
    pub input_schema: Option<serde_json::Value>,
    /// Response JSON Schema, if declared.
    pub output_schema: Option<serde_json::Value>,
    /// Headers, possibly containing `${token}` / `${api_key}` placeholders.
    pub headers: HashMap<String, String>,
    /// Per-endpoint cache TTL hint in seconds, if declared.
    pub cache_ttl: Option<u64>,
    /// Response rendering template, if declared.
    pub response_template: Option<String>,
    /// Keywords mined from summary, path, and method.
    pub keywords: Vec<String>,
    /// Heuristic regex pattern sources for intent matching.
    pub patterns: Vec<String>,
    /// Whether the method is safe/idempotent (cacheable).
    pub safe: bool,
}

/// Compiles stubs from a descriptor.
pub struct StubCompiler;

impl StubCompiler {
    /// Compile one stub per descriptor endpoint.
    pub fn compile(descriptor: &Descriptor) -> Vec<CompiledStub> {
        descriptor
            .endpoints
            .iter()
            .map(|endpoint| Self::compile_endpoint(endpoint, descriptor))
            .collect()
    }

    fn compile_endpoint(endpoint: &EndpointInfo, descriptor: &Descriptor) -> CompiledStub {
        let keywords = extract_keywords(endpoint);
        let patterns = generate_patterns(endpoint, &keywords);

        CompiledStub {
            name: stub_name(endpoint),
            method: endpoint.method.clone(),
            url: format!(
                "{}{}",
                descriptor.base_url.trim_end_matches('/'),
                endpoint.path
            ),
            path: endpoint.path.clone(),
            summary: endpoint.summary.clone(),
            input_schema: descriptor.request_schema(&endpoint.path).cloned(),
            output_schema: descriptor.response_schema(&endpoint.path).cloned(),
            headers: build_headers(descriptor),
            cache_ttl: descriptor.cache_hints.get(&endpoint.path).copied(),
            response_template: descriptor.response_templates.get(&endpoint.path).cloned(),
            keywords,
            patterns,
            safe: endpoint.is_safe(),
        }
    }
}

/// Generate a stub name: `/users/{id}` + GET → `fetch_users_by_id`.
fn stub_name(endpoint: &EndpointInfo) -> String {
    let path = endpoint.path.trim_matches('/');
    let mut parts = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            parts.push(format!("by_{param}"));
        } else {
            parts.push(segment.to_string());
        }
    }

    let method_prefix = match endpoint.method.as_str() {
        "GET" if endpoint.path.contains('{') => "fetch",
        "GET" => "list",
        other => return format!("{}_{}", other.to_lowercase(), parts.join("_")),
    };
    if parts.is_empty() {
        method_prefix.to_string()
    } else {
        format!("{method_prefix}_{}", parts.join("_"))
    }
}

/// Keywords from the summary, path segments, and method verb family.
/// Words shorter than three characters are dropped.
fn extract_keywords(endpoint: &EndpointInfo) -> Vec<String> {
    let mut keywords = Vec::new();

    for word in endpoint.summary.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if !word.is_empty() {
            keywords.push(word.to_string());
        }
    }

    for segment in endpoint.path.trim_matches('/').split('/') {
        if !segment.starts_with('{') && !segment.is_empty() {
            keywords.push(segment.to_lowercase());
        }
    }

    let verbs: &[&str] = match endpoint.method.as_str() {
        "POST" => &["create", "add", "new"],
        "GET" => &["get", "fetch", "list", "show"],
        "PUT" | "PATCH" => &["update", "edit", "modify"],
        "DELETE" => &["delete", "remove", "destroy"],
        _ => &[],
    };
    keywords.extend(verbs.iter().map(|v| v.to_string()));

    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .filter(|k| k.len() > 2 && seen.insert(k.clone()))
        .collect()
}

/// Heuristic regex pattern sources for an endpoint.
fn generate_patterns(endpoint: &EndpointInfo, keywords: &[String]) -> Vec<String> {
    let mut patterns = Vec::new();

    if let Some(resource) = resource_from_path(&endpoint.path) {
        match endpoint.method.as_str() {
            "POST" => patterns.push(format!("(create|add|new).*{resource}")),
            "GET" if endpoint.path.contains('{') => {
                patterns.push(format!(r"(get|fetch|show).*{resource}.*\b\w+\b"))
            }
            "GET" => patterns.push(format!("(list|get|show).*{resource}")),
            "PUT" | "PATCH" => patterns.push(format!("(update|edit|modify).*{resource}")),
            "DELETE" => patterns.push(format!("(delete|remove).*{resource}")),
            _ => {}
        }
    }

    if let Some(pattern) = summary_to_pattern(&endpoint.summary) {
        patterns.push(pattern);
    }

    if keywords.len() >= 2 {
        let important: Vec<&str> = keywords.iter().take(3).map(String::as_str).collect();
        patterns.push(format!(".*{}.*", important.join(".*")));
    }

    patterns
}

/// The main resource noun in a path, singularized: `/todos/{id}` → `todo`.
pub(crate) fn resource_from_path(path: &str) -> Option<String> {
    let first = path
        .trim_matches('/')
        .split('/')
        .find(|s| !s.is_empty() && !s.starts_with('{'))?;
    let resource = first.strip_suffix('s').unwrap_or(first);
    Some(resource.to_lowercase())
}

/// Derive a loose pattern from a summary: first action verb (with its
/// synonym family) followed by the first substantial noun.
fn summary_to_pattern(summary: &str) -> Option<String> {
    let mut action = None;
    let mut resource = None;

    for word in summary.to_lowercase().split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if action.is_none() {
            for family in [CREATE_VERBS, READ_VERBS, UPDATE_VERBS, DELETE_VERBS] {
                if family.contains(&word) {
                    let synonyms: Vec<&str> = family.iter().take(3).copied().collect();
                    action = Some(format!("({word}|{})", synonyms.join("|")));
                    break;
                }
            }
            if action.is_some() {
                continue;
            }
        }
        if resource.is_none()
            && word.len() > 3
            && !matches!(word, "with" | "from" | "into" | "that")
        {
            resource = Some(word.to_string());
        }
    }

    match (action, resource) {
        (Some(a), Some(r)) => Some(format!(".*{a}.*{r}.*")),
        _ => None,
    }
}

/// Headers with auth placeholders resolved at execution time.
fn build_headers(descriptor: &Descriptor) -> HashMap<String, String> {
    let mut headers = HashMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ]);

    match descriptor.auth_type() {
        "bearer" => {
            headers.insert("Authorization".into(), "Bearer ${token}".into());
        }
        "api_key" => {
            let header = descriptor
                .auth
                .get("header")
                .and_then(|v| v.as_str())
                .unwrap_or("X-API-Key");
            headers.insert(header.to_string(), "${api_key}".into());
        }
        "basic" => {
            headers.insert("Authorization".into(), "Basic ${credentials}".into());
        }
        _ => {}
    }

    headers
}

/// The immutable endpoint-metadata table the router consults.
#[derive(Debug, Default)]
pub struct StubStore {
    stubs: Vec<CompiledStub>,
    by_name: HashMap<String, usize>,
    by_endpoint: HashMap<String, usize>,
}

impl StubStore {
    /// Build the table from a descriptor.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        let stubs = StubCompiler::compile(descriptor);
        let mut by_name = HashMap::new();
        let mut by_endpoint = HashMap::new();
        for (i, stub) in stubs.iter().enumerate() {
            by_name.insert(stub.name.clone(), i);
            by_endpoint.insert(format!("{}:{}", stub.method, stub.path), i);
        }
        Self {
            stubs,
            by_name,
            by_endpoint,
        }
    }

    /// Look up a stub by generated name.
    pub fn get(&self, name: &str) -> Option<&CompiledStub> {
        self.by_name.get(name).map(|&i| &self.stubs[i])
    }

    /// Look up a stub by (method, path).
    pub fn get_by_endpoint(&self, method: &str, path: &str) -> Option<&CompiledStub> {
        self.by_endpoint
            .get(&format!("{method}:{path}"))
            .map(|&i| &self.stubs[i])
    }

    /// All stubs in declaration order.
    pub fn all(&self) -> &[CompiledStub] {
        &self.stubs
    }

    /// Number of stubs.
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Whether a stub with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
