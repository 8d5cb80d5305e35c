//! Intent matchers — the tagged variants a route attempt runs through.
//!
//! Three kinds: `Learned` (a mined regex with extraction hints),
//! `Pattern` (a heuristic regex compiled from the descriptor), and
//! `Keyword` / `Action` overlap heuristics. Each exposes exactly one
//! capability: match text, return extracted args and a confidence, or
//! nothing.

use crate::extract;
use regex::Regex;
use sockagent_core::{LearnedPattern, LearningError};
use std::collections::BTreeMap;

/// Words that carry routing signal when they overlap with stub keywords.
const IMPORTANT_KEYWORDS: &[&str] = &[
    "create", "add", "new", "delete", "remove", "update", "edit", "get", "list", "fetch", "user",
    "account", "order", "product", "item", "cart", "payment", "todo", "task",
];

/// A successful match: where to route and with what.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Stub name of the matched endpoint.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Endpoint path.
    pub path: String,
    /// Extracted arguments.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Match confidence in 0..=1.
    pub confidence: f64,
    /// Observations backing the match (0 for heuristics).
    pub observations: u64,
    /// Why this matched.
    pub reasoning: String,
    /// Source intent pattern for learned matches.
    pub matched_pattern: Option<String>,
}

/// A learned pattern compiled for routing.
#[derive(Debug, Clone)]
pub struct ActivePattern {
    /// The pattern as mined/loaded (source of truth for serialization).
    pub pattern: LearnedPattern,
    /// Stub name the pattern routes to.
    pub endpoint: String,
    /// Request schema of that endpoint, used as extraction fallback.
    pub input_schema: Option<serde_json::Value>,
    regex: Regex,
}

impl ActivePattern {
    /// Compile a learned pattern. Invalid regexes are a `LearningError`
    /// (isolated by callers, never fatal to routing).
    pub fn compile(
        pattern: LearnedPattern,
        endpoint: impl Into<String>,
        input_schema: Option<serde_json::Value>,
    ) -> Result<Self, LearningError> {
        let regex = Regex::new(&format!("(?i){}", pattern.intent_pattern)).map_err(|e| {
            LearningError::InvalidPattern {
                pattern: pattern.intent_pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            pattern,
            endpoint: endpoint.into(),
            input_schema,
            regex,
        })
    }

    /// Attempt a match against canonicalized text.
    pub fn matches(&self, text: &str) -> Option<MatchOutcome> {
        if !self.regex.is_match(text) {
            return None;
        }
        let args = extract::extract_with_hints(
            text,
            &self.pattern.api_pattern.path,
            &self.pattern.api_pattern.extract_params,
            self.input_schema.as_ref(),
        );
        Some(MatchOutcome {
            endpoint: self.endpoint.clone(),
            method: self.pattern.api_pattern.method.clone(),
            path: self.pattern.api_pattern.path.clone(),
            args,
            confidence: self.pattern.confidence,
            observations: self.pattern.observations,
            reasoning: format!("Learned pattern: {}", self.pattern.intent_pattern),
            matched_pattern: Some(self.pattern.intent_pattern.clone()),
        })
    }
}

/// The static per-stub facts a heuristic matcher needs.
#[derive(Debug, Clone)]
pub struct MatchTarget {
    pub endpoint: String,
    pub method: String,
    pub path: String,
    pub input_schema: Option<serde_json::Value>,
}

/// A heuristic intent matcher built from the descriptor.
#[derive(Debug)]
pub enum Matcher {
    /// A compiler-generated regex; confidence scales with match coverage.
    Pattern {
        target: MatchTarget,
        source: String,
        regex: Regex,
    },
    /// Keyword overlap between the text and the stub's mined keywords.
    Keyword {
        target: MatchTarget,
        keywords: Vec<String>,
    },
    /// Action verb family + resource noun co-occurrence.
    Action {
        target: MatchTarget,
        resource: String,
    },
}

impl Matcher {
    /// Attempt a match against canonicalized text.
    pub fn matches(&self, text: &str) -> Option<MatchOutcome> {
        match self {
            Self::Pattern {
                target,
                source,
                regex,
            } => {
                let m = regex.find(text)?;
                // Confidence scales with how much of the text the pattern
                // explains, capped below learned-pattern territory.
                let coverage = m.len() as f64 / text.len().max(1) as f64;
                let confidence = (0.7 + coverage * 0.25).min(0.95);
                Some(self.outcome(
                    target,
                    text,
                    confidence,
                    format!("Pattern match: {source}"),
                ))
            }
            Self::Keyword { target, keywords } => {
                let words: std::collections::HashSet<&str> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                let common: Vec<&str> = keywords
                    .iter()
                    .map(String::as_str)
                    .filter(|k| words.contains(k))
                    .collect();
                if common.is_empty() {
                    return None;
                }
                let overlap_ratio = common.len() as f64 / keywords.len().max(1) as f64;
                let important = common
                    .iter()
                    .filter(|k| IMPORTANT_KEYWORDS.contains(*k))
                    .count();
                let importance = (important as f64 / common.len() as f64).min(1.0);
                let confidence = (overlap_ratio * 0.6 + importance * 0.4).min(0.90);
                Some(self.outcome(
                    target,
                    text,
                    confidence,
                    format!("Keywords: {}", common.join(", ")),
                ))
            }
            Self::Action { target, resource } => {
                let verbs: &[&str] = match target.method.as_str() {
                    "POST" => crate::stub::CREATE_VERBS,
                    "GET" => crate::stub::READ_VERBS,
                    "PUT" | "PATCH" => crate::stub::UPDATE_VERBS,
                    "DELETE" => crate::stub::DELETE_VERBS,
                    _ => return None,
                };
                let words: Vec<&str> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                let verb = verbs.iter().find(|v| words.contains(v))?;
                let mentions_resource = words
                    .iter()
                    .any(|w| *w == resource || w.strip_suffix('s') == Some(resource));
                if !mentions_resource {
                    return None;
                }
                Some(self.outcome(
                    target,
                    text,
                    0.85,
                    format!("Action '{verb}' + resource '{resource}'"),
                ))
            }
        }
    }

    fn outcome(
        &self,
        target: &MatchTarget,
        text: &str,
        confidence: f64,
        reasoning: String,
    ) -> MatchOutcome {
        MatchOutcome {
            endpoint: target.endpoint.clone(),
            method: target.method.clone(),
            path: target.path.clone(),
            args: extract::extract_for_schema(text, target.input_schema.as_ref()),
            confidence,
            observations: 0,
            reasoning,
            matched_pattern: None,
        }
    }
}
