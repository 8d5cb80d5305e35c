//! Bounded-concurrency batch execution.

use crate::http::HttpExecutor;
use futures::stream::{self, StreamExt};
use sockagent_core::ApiResult;
use std::collections::{BTreeMap, HashMap};

/// One request in a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub method: String,
    pub url: String,
    pub args: BTreeMap<String, serde_json::Value>,
    pub body: Option<serde_json::Value>,
    pub headers: HashMap<String, String>,
}

impl BatchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            args: BTreeMap::new(),
            body: None,
            headers: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }
}

/// Runs batches concurrently with a concurrency bound.
///
/// Results come back in request order regardless of completion order,
/// and a failing call never cancels its siblings — it simply yields a
/// failed [`ApiResult`] in its slot.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    executor: HttpExecutor,
    max_concurrent: usize,
}

impl BatchExecutor {
    pub fn new(executor: HttpExecutor, max_concurrent: usize) -> Self {
        Self {
            executor,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn execute(&self, requests: Vec<BatchRequest>) -> Vec<ApiResult> {
        stream::iter(requests)
            .map(|req| {
                let executor = self.executor.clone();
                async move {
                    executor
                        .execute(
                            &req.method,
                            &req.url,
                            &req.args,
                            req.body.as_ref(),
                            &req.headers,
                        )
                        .await
                }
            })
            // `buffered` polls up to max_concurrent futures at once but
            // yields results in input order.
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}
