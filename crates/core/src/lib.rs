//! # sockagent Core
//!
//! Domain types, traits, and error definitions for the sockagent smart
//! API client. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every optional capability (confidence scorer, embedder, LLM fallback)
//! is defined as a trait here with a no-op or absent default. Routing,
//! caching, and learning must function with every external capability
//! entirely missing.

pub mod call;
pub mod descriptor;
pub mod error;
pub mod llm;
pub mod pattern;
pub mod route;
pub mod scorer;

// Re-export key types at crate root for ergonomics
pub use call::{ApiCall, ApiResult, Via};
pub use descriptor::{Descriptor, EndpointInfo};
pub use error::{
    DiscoveryError, Error, ExecutionError, LearningError, Result, RoutingError, StubFormatError,
};
pub use llm::LlmHandler;
pub use pattern::{
    ApiPattern, LearnedPattern, Observation, StubFile, HINT_AFTER_ACTION, HINT_AFTER_COLON,
    HINT_FROM_INTENT, STUB_FORMAT_VERSION,
};
pub use route::{Decision, RouteResult};
pub use scorer::{Embedder, NoopScorer, ScoreCandidate, Scorer};
