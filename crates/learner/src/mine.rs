//! Pattern mining over the observation log.
//!
//! Groups observations by endpoint, mines a loose intent regex from the
//! words the group's intents share, derives per-parameter extraction
//! hints from how values historically appeared in the text, and scores
//! confidence as the fraction of the group that succeeded with the
//! majority argument shape.

use sockagent_core::{
    ApiPattern, LearnedPattern, LearningError, Observation, HINT_AFTER_ACTION, HINT_AFTER_COLON,
    HINT_FROM_INTENT,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Action verb synonym families used to loosen mined patterns.
const VERB_FAMILIES: &[&[&str]] = &[
    &["create", "add", "new", "make", "insert"],
    &["get", "list", "show", "fetch", "find"],
    &["update", "edit", "modify", "change"],
    &["delete", "remove", "destroy", "clear"],
];

/// Mine learned patterns from a batch of observations.
///
/// Corrupt observations are isolated with a warning; groups that yield
/// no stable intent shape are skipped. Results are sorted by descending
/// confidence.
pub fn mine(observations: &[Observation], min_observations: usize) -> Vec<LearnedPattern> {
    let mut groups: BTreeMap<String, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        if obs.intent.trim().is_empty() {
            let err = LearningError::CorruptObservation("empty intent text".into());
            warn!(error = %err, endpoint = %obs.call.endpoint_key(), "skipping observation");
            continue;
        }
        groups.entry(obs.call.endpoint_key()).or_default().push(obs);
    }

    let mut patterns = Vec::new();
    for (endpoint, group) in &groups {
        if group.len() < min_observations {
            debug!(
                endpoint = %endpoint,
                observed = group.len(),
                required = min_observations,
                "too few observations to mine"
            );
            continue;
        }

        let intents: Vec<&str> = group.iter().map(|o| o.intent.as_str()).collect();
        let Some(intent_pattern) = mine_intent_pattern(&intents) else {
            debug!(endpoint = %endpoint, "no shared intent words, skipping group");
            continue;
        };
        if let Err(e) = regex::Regex::new(&format!("(?i){intent_pattern}")) {
            let err = LearningError::MiningFailed(format!(
                "mined pattern '{intent_pattern}' does not compile: {e}"
            ));
            warn!(error = %err, endpoint = %endpoint, "discarding mined pattern");
            continue;
        }

        let sample = &group[0].call;
        patterns.push(LearnedPattern {
            intent_pattern,
            api_pattern: ApiPattern {
                method: sample.method.clone(),
                path: sample.path.clone(),
                extract_params: mine_hints(group),
            },
            confidence: agreement_confidence(group),
            observations: group.len() as u64,
        });
    }

    patterns.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.observations.cmp(&a.observations))
    });
    patterns
}

/// Words shared by at least half the intents, in first-intent order,
/// with action verbs widened to their synonym family.
fn mine_intent_pattern(intents: &[&str]) -> Option<String> {
    let token_sets: Vec<BTreeSet<String>> = intents.iter().map(|i| tokenize(i)).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for set in &token_sets {
        for word in set {
            *counts.entry(word).or_default() += 1;
        }
    }
    let threshold = intents.len().div_ceil(2);
    let mut common: Vec<&str> = counts
        .iter()
        .filter(|&(_, &n)| n >= threshold)
        .map(|(&w, _)| w)
        .collect();
    if common.is_empty() {
        return None;
    }

    // Keep the first intent's word order so the pattern reads naturally.
    let first = intents[0].to_lowercase();
    common.sort_by_key(|w| (first.find(*w).unwrap_or(usize::MAX), w.to_string()));

    let parts: Vec<String> = common.into_iter().map(expand_verb).collect();
    Some(format!(".*{}.*", parts.join(".*")))
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

/// `create` → `(create|add|new)`; non-verbs pass through.
fn expand_verb(word: &str) -> String {
    for family in VERB_FAMILIES {
        if family.contains(&word) {
            let mut synonyms: Vec<&str> = family.iter().take(3).copied().collect();
            if !synonyms.contains(&word) {
                synonyms.insert(0, word);
            }
            return format!("({})", synonyms.join("|"));
        }
    }
    regex::escape(word)
}

/// Derive an extraction hint per parameter by majority vote over how the
/// recorded value related to the intent text.
fn mine_hints(group: &[&Observation]) -> BTreeMap<String, String> {
    let mut params: BTreeSet<&str> = BTreeSet::new();
    for obs in group {
        params.extend(obs.call.args.keys().map(String::as_str));
    }

    let mut hints = BTreeMap::new();
    for param in params {
        let mut colon = 0usize;
        let mut trailing = 0usize;
        let mut seen = 0usize;
        for obs in group {
            let Some(value) = obs.call.args.get(param).and_then(|v| v.as_str()) else {
                continue;
            };
            seen += 1;
            let value = value.to_lowercase();
            let intent = obs.intent.to_lowercase();
            if let Some((_, rest)) = intent.split_once(':') {
                if rest.trim() == value {
                    colon += 1;
                    continue;
                }
            }
            if intent.trim_end().ends_with(&value) {
                trailing += 1;
            }
        }

        let hint = if seen > 0 && colon * 2 >= seen {
            HINT_AFTER_COLON
        } else if seen > 0 && trailing * 2 >= seen {
            HINT_AFTER_ACTION
        } else {
            HINT_FROM_INTENT
        };
        hints.insert(param.to_string(), hint.to_string());
    }
    hints
}

/// Fraction of the group that succeeded with the majority argument shape.
/// Conflicting extractions lower confidence, they never error.
fn agreement_confidence(group: &[&Observation]) -> f64 {
    let shape_of = |obs: &Observation| -> Vec<String> { obs.call.args.keys().cloned().collect() };

    let mut shapes: HashMap<Vec<String>, usize> = HashMap::new();
    for obs in group {
        *shapes.entry(shape_of(obs)).or_default() += 1;
    }
    let majority = shapes
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(shape, _)| shape)
        .unwrap_or_default();

    let agreeing = group
        .iter()
        .filter(|obs| obs.result.success && shape_of(obs) == majority)
        .count();
    agreeing as f64 / group.len() as f64
}
