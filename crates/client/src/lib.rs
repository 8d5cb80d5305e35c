//! # sockagent Client
//!
//! The facade crate: discover a socket-agent service, route free-text
//! intents to its endpoints, execute them with caching and telemetry,
//! learn recurring patterns, and ship them as portable stub artifacts.
//!
//! ```no_run
//! use sockagent_client::Client;
//!
//! # async fn demo() -> sockagent_core::Result<()> {
//! let client = Client::discover("http://localhost:8000").await?;
//! let result = client.call("create a todo: buy milk").await;
//! println!("{:?}", result.body);
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::{Client, ClientBuilder, ConfirmHook};

// The pieces the facade wires together, for callers extending it.
pub use sockagent_config::{create_policy, Policy, Preset};
pub use sockagent_core::{
    ApiCall, ApiResult, Decision, Descriptor, Embedder, Error, LlmHandler, Result, RouteResult,
    Scorer, StubFile, Via,
};
pub use sockagent_executor::AuthContext;
pub use sockagent_telemetry::TelemetrySummary;

/// Initialize process-wide logging with `RUST_LOG`-style filtering.
/// Call at most once; library code never does this for you.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}
