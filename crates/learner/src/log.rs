//! The synchronized observation log.

use sockagent_core::Observation;
use std::sync::RwLock;
use tracing::debug;

/// Append-only record of (intent, call, result) interactions, with an
/// optional retention cap. Eviction is oldest-first.
#[derive(Debug, Default)]
pub struct ObservationLog {
    entries: RwLock<Vec<Observation>>,
    max_entries: Option<usize>,
}

impl ObservationLog {
    /// An unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log retaining at most `max_entries` observations.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries: Some(max_entries),
        }
    }

    /// Append an observation, evicting the oldest when over capacity.
    pub fn push(&self, observation: Observation) {
        let mut entries = self.entries.write().unwrap();
        entries.push(observation);
        if let Some(cap) = self.max_entries {
            if entries.len() > cap {
                let excess = entries.len() - cap;
                entries.drain(..excess);
                debug!(evicted = excess, cap, "observation log trimmed");
            }
        }
    }

    /// Clone the current contents for analysis.
    pub fn snapshot(&self) -> Vec<Observation> {
        self.entries.read().unwrap().clone()
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the log holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
