//! The client facade wiring discovery, routing, caching, execution,
//! telemetry, and learning together.

use sockagent_cache::{cache_key, CacheLayer, CacheStats};
use sockagent_config::Policy;
use sockagent_core::{
    ApiCall, ApiResult, Decision, Descriptor, Embedder, Error, ExecutionError, LlmHandler, Result,
    RouteResult, RoutingError, Scorer, StubFile, Via,
};
use sockagent_discovery::DescriptorFetcher;
use sockagent_executor::{AuthContext, HttpExecutor};
use sockagent_learner::PatternLearner;
use sockagent_router::{RulesEngine, StubStore};
use sockagent_telemetry::{CallEvent, Telemetry, TelemetrySummary};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Simultaneous in-flight requests a batch may open.
const MAX_BATCH_CONCURRENCY: usize = 8;

/// Gate for `Confirm` decisions. Returning `false` sends the call down
/// the LLM fallback path instead of executing it.
pub type ConfirmHook = Box<dyn Fn(&RouteResult) -> bool + Send + Sync>;

/// Builds a [`Client`] with optional capabilities attached.
pub struct ClientBuilder {
    policy: Policy,
    scorer: Option<Arc<dyn Scorer>>,
    embedder: Option<Arc<dyn Embedder>>,
    auth: AuthContext,
    fetcher: DescriptorFetcher,
    executor: HttpExecutor,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            policy: Policy::default(),
            scorer: None,
            embedder: None,
            auth: AuthContext::default(),
            fetcher: DescriptorFetcher::new(),
            executor: HttpExecutor::new(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach an external confidence scorer to the router.
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Attach an embedder; activates the semantic cache layer when the
    /// policy enables it.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_fetcher(mut self, fetcher: DescriptorFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_executor(mut self, executor: HttpExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Fetch the service descriptor and assemble the client.
    pub async fn discover(self, service_url: &str) -> Result<Client> {
        self.policy.validate()?;
        let descriptor = self.fetcher.fetch(service_url).await?;
        info!(
            service = %descriptor.name,
            endpoints = descriptor.endpoints.len(),
            "descriptor discovered"
        );

        let store = Arc::new(StubStore::from_descriptor(&descriptor));
        let mut engine = RulesEngine::new(Arc::clone(&store), self.policy.clone());
        if let Some(scorer) = self.scorer {
            engine = engine.with_scorer(scorer);
        }

        let mut cache = CacheLayer::new(self.policy.max_cache_entries);
        if self.policy.enable_semantic_cache {
            match self.embedder {
                Some(embedder) => {
                    cache = cache.with_semantic(
                        embedder,
                        self.policy.semantic_cache_radius,
                        self.policy.max_cache_entries,
                    );
                }
                None => {
                    warn!("semantic cache enabled but no embedder supplied, staying exact-only")
                }
            }
        }

        Ok(Client {
            service_url: service_url.to_string(),
            telemetry: Telemetry::new(
                self.policy.telemetry_enabled,
                self.policy.fallback_token_cost,
            ),
            cache,
            learner: PatternLearner::new(),
            executor: self.executor.with_auth(self.auth),
            engine,
            store,
            descriptor,
            policy: self.policy,
            llm: RwLock::new(None),
            confirm_hook: RwLock::new(None),
        })
    }
}

/// A smart API client bound to one discovered service.
///
/// The whole API is `&self`; cache, telemetry, learner, and the learned
/// pattern set each own their synchronization, so one `Client` is meant
/// to be shared across tasks.
pub struct Client {
    descriptor: Descriptor,
    service_url: String,
    policy: Policy,
    store: Arc<StubStore>,
    engine: RulesEngine,
    cache: CacheLayer,
    telemetry: Telemetry,
    learner: PatternLearner,
    executor: HttpExecutor,
    llm: RwLock<Option<Arc<dyn LlmHandler>>>,
    confirm_hook: RwLock<Option<ConfirmHook>>,
}

impl Client {
    /// Discover a service with the default policy.
    pub async fn discover(service_url: &str) -> Result<Self> {
        ClientBuilder::new().discover(service_url).await
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The discovered descriptor.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The compiled endpoint table.
    pub fn stubs(&self) -> &StubStore {
        &self.store
    }

    /// Register the LLM fallback handler.
    pub fn set_llm_handler(&self, handler: Arc<dyn LlmHandler>) {
        *self.llm.write().unwrap() = Some(handler);
    }

    /// Register a gate for `Confirm` decisions. Without one, `Confirm`
    /// proceeds like `Direct`.
    pub fn set_confirm_hook(&self, hook: ConfirmHook) {
        *self.confirm_hook.write().unwrap() = Some(hook);
    }

    /// Route text without executing anything.
    pub fn route(&self, text: &str) -> RouteResult {
        self.engine.route(text)
    }

    /// Route and execute one free-text request.
    ///
    /// Failures come back as failed [`ApiResult`]s, never as `Err`.
    pub async fn call(&self, text: &str) -> ApiResult {
        let call_id = Uuid::new_v4();
        let route = self.engine.route(text);
        debug!(
            %call_id,
            endpoint = %route.endpoint,
            decision = %route.decision,
            confidence = route.confidence,
            "routed call"
        );

        match route.decision {
            Decision::Fallback => self.llm_fallback(text, &route).await,
            Decision::Confirm if !self.confirmed(&route) => {
                debug!(%call_id, "confirmation denied, delegating to fallback");
                self.llm_fallback(text, &route).await
            }
            _ => self.execute_routed(text, &route).await,
        }
    }

    /// Call an endpoint by stub name, bypassing routing.
    pub async fn invoke(
        &self,
        endpoint: &str,
        args: BTreeMap<String, serde_json::Value>,
    ) -> Result<ApiResult> {
        if !self.store.contains(endpoint) {
            return Err(Error::Routing(RoutingError::EndpointNotFound(
                endpoint.to_string(),
            )));
        }
        let route = RouteResult {
            endpoint: endpoint.to_string(),
            method: String::new(),
            path: String::new(),
            args,
            confidence: 1.0,
            decision: Decision::Direct,
            reasoning: Some("direct invocation".into()),
            matched_pattern: None,
        };
        Ok(self.execute_routed(endpoint, &route).await)
    }

    /// Route and execute many requests with bounded concurrency; results
    /// keep input order and one failure never cancels the rest.
    pub async fn call_batch(&self, texts: &[&str]) -> Vec<ApiResult> {
        use futures::stream::StreamExt;

        futures::stream::iter(texts)
            .map(|text| self.call(text))
            .buffered(MAX_BATCH_CONCURRENCY)
            .collect()
            .await
    }

    /// Mine the observation log and install the result for routing.
    /// Returns the number of active patterns.
    pub fn analyze_now(&self) -> usize {
        let patterns = self.learner.analyze_patterns();
        self.engine.install_patterns(patterns)
    }

    /// Load a portable stub artifact and activate its patterns.
    ///
    /// The observation log is untouched; a bad file fails only this call.
    pub fn load_stub_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let stub = StubFile::load(path)?;
        info!(
            source = %stub.source,
            patterns = stub.learned_patterns.len(),
            "stub file loaded"
        );
        Ok(self.engine.install_patterns(stub.learned_patterns))
    }

    /// Freeze high-confidence learned patterns to a stub artifact.
    pub fn export_stub_file(&self, path: impl AsRef<Path>) -> Result<StubFile> {
        let stub = self.learner.generate_stub(self.service_url.clone());
        stub.save(path)?;
        Ok(stub)
    }

    /// Offer an out-of-band interaction to the learner, e.g. an API call
    /// an LLM handler made on the caller's behalf.
    pub fn record_observation(&self, intent: &str, call: ApiCall, result: ApiResult) {
        if self.policy.enable_learning {
            self.learner.observe(intent, call, result);
        }
    }

    pub fn telemetry_summary(&self) -> TelemetrySummary {
        self.telemetry.summary()
    }

    pub fn export_telemetry(&self, path: impl AsRef<Path>) -> Result<()> {
        self.telemetry.export(path)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn confirmed(&self, route: &RouteResult) -> bool {
        match &*self.confirm_hook.read().unwrap() {
            Some(hook) => hook(route),
            None => true,
        }
    }

    async fn execute_routed(&self, text: &str, route: &RouteResult) -> ApiResult {
        let Some(stub) = self.store.get(&route.endpoint) else {
            return ApiResult::failure(
                format!("no compiled stub for endpoint '{}'", route.endpoint),
                0.0,
            );
        };

        let key = cache_key(&stub.name, &self.descriptor.spec_version, &route.args);
        if stub.safe {
            if let Some(value) = self.cache.get(&key, text) {
                let mut result = ApiResult::from_status(200, Some(value), 0.0).as_cache_hit(0.0);
                result.rendered_text = render_template(stub.response_template.as_deref(), &result);
                self.record_call(route, &result, Via::Direct);
                return result;
            }
        }

        let mut result = self
            .executor
            .execute(&stub.method, &stub.url, &route.args, None, &stub.headers)
            .await;
        result.rendered_text = render_template(stub.response_template.as_deref(), &result);

        if stub.safe && result.success {
            if let Some(body) = &result.body {
                let ttl = self.policy.ttl_for(&stub.name, stub.cache_ttl);
                self.cache.put(&key, text, body.clone(), ttl);
            }
        }

        self.record_call(route, &result, Via::Direct);
        if self.policy.enable_learning {
            let mut call = ApiCall::new(stub.method.clone(), stub.path.clone());
            call.args = route.args.clone();
            self.learner.observe(text, call, result.clone());
        }
        result
    }

    async fn llm_fallback(&self, text: &str, route: &RouteResult) -> ApiResult {
        let handler = self.llm.read().unwrap().clone();
        let result = match handler {
            None => {
                let err = ExecutionError::NoLlmHandler;
                ApiResult::failure(err.to_string(), 0.0)
            }
            Some(handler) => match handler.handle(text, &self.descriptor).await {
                Ok(mut result) => {
                    if result.tokens_used == 0 {
                        result.tokens_used = handler.estimated_tokens_per_call();
                    }
                    result
                }
                Err(e) => ApiResult::failure(ExecutionError::LlmHandler(e.to_string()).to_string(), 0.0),
            },
        };
        self.record_call(route, &result, Via::Llm);
        result
    }

    fn record_call(&self, route: &RouteResult, result: &ApiResult, via: Via) {
        self.telemetry.record(CallEvent {
            confidence: route.confidence,
            tokens_used: result.tokens_used,
            latency_ms: result.duration_ms,
            success: result.success,
            cache_hit: result.cache_hit,
            short_circuit: via == Via::Direct && route.decision == Decision::Direct,
            ..CallEvent::now(route.endpoint.clone(), via)
        });
    }
}

/// Fill `{field}` placeholders in a response template from the body.
fn render_template(template: Option<&str>, result: &ApiResult) -> Option<String> {
    let template = template?;
    let body = result.body.as_ref()?;
    let mut rendered = template.to_string();
    if let Some(object) = body.as_object() {
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&format!("{{{key}}}"), &text);
        }
    }
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_body_fields() {
        let result = ApiResult::from_status(
            200,
            Some(serde_json::json!({"id": 7, "text": "buy milk"})),
            1.0,
        );
        assert_eq!(
            render_template(Some("Todo {id}: {text}"), &result),
            Some("Todo 7: buy milk".to_string())
        );
        assert_eq!(render_template(None, &result), None);
    }
}
