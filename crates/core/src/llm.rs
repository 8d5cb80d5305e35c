//! LLM fallback handler trait.
//!
//! When routing confidence falls below the fallback threshold, the client
//! delegates the request to a caller-supplied handler. The handler's
//! result is treated as an opaque outcome: it is recorded into telemetry
//! and optionally offered to the learner, but never interpreted.

use crate::call::ApiResult;
use crate::descriptor::Descriptor;
use crate::error::ExecutionError;
use async_trait::async_trait;

/// A caller-supplied fallback that resolves free text with a full LLM.
#[async_trait]
pub trait LlmHandler: Send + Sync {
    /// Resolve `text` against the service described by `descriptor`.
    async fn handle(
        &self,
        text: &str,
        descriptor: &Descriptor,
    ) -> std::result::Result<ApiResult, ExecutionError>;

    /// Estimated tokens one fallback call consumes, used for the
    /// tokens-saved heuristic when the handler doesn't report usage.
    fn estimated_tokens_per_call(&self) -> u64 {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl LlmHandler for EchoHandler {
        async fn handle(
            &self,
            text: &str,
            _descriptor: &Descriptor,
        ) -> std::result::Result<ApiResult, ExecutionError> {
            let mut result = ApiResult::from_status(
                200,
                Some(serde_json::json!({"echo": text})),
                1.0,
            );
            result.tokens_used = self.estimated_tokens_per_call();
            Ok(result)
        }
    }

    #[tokio::test]
    async fn handler_result_is_opaque() {
        let descriptor: Descriptor = serde_json::from_value(serde_json::json!({
            "name": "svc",
            "base_url": "http://localhost",
            "endpoints": [{"path": "/x", "method": "GET", "summary": "x"}]
        }))
        .unwrap();

        let result = EchoHandler.handle("do the thing", &descriptor).await.unwrap();
        assert!(result.success);
        assert_eq!(result.tokens_used, 500);
    }
}
