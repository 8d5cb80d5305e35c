//! # sockagent Router
//!
//! Maps free-text intents to concrete API calls with a confidence score.
//!
//! Routing consults, in order: learned patterns (highest confidence
//! first), then static heuristics compiled from the descriptor (regex
//! patterns, keyword overlap, action-verb + resource), optionally
//! re-ranked by an injected [`Scorer`](sockagent_core::Scorer). The
//! result carries a [`Decision`](sockagent_core::Decision) classified by
//! the configured policy thresholds.

pub mod engine;
pub mod extract;
pub mod matcher;
pub mod stub;

pub use engine::RulesEngine;
pub use matcher::{ActivePattern, MatchOutcome, Matcher};
pub use stub::{CompiledStub, StubCompiler, StubStore};
