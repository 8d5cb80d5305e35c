//! # sockagent Executor
//!
//! Turns resolved API calls into HTTP requests: merges extracted
//! arguments into path placeholders, query strings, or JSON bodies,
//! substitutes auth material into header placeholders, retries transient
//! network failures, and runs batches under a concurrency bound.
//!
//! Failures are data here, not control flow: every execution path
//! produces an [`ApiResult`](sockagent_core::ApiResult).

pub mod batch;
pub mod http;

pub use batch::{BatchExecutor, BatchRequest};
pub use http::{merge_path_params, AuthContext, HttpExecutor};
