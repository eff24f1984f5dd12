use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use crate::domain::estimation::state::StateKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// Raw tally of one `(state, outcome)` cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OutcomeCount {
    /// Occurrences of the state
    pub samples: usize,
    /// Occurrences of the state followed by the outcome
    pub wins: usize,
}

impl OutcomeCount {
    pub fn p_raw(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.wins as f64 / self.samples as f64)
    }
}

/// Per-state outcome histogram. `by_outcome[label]` counts how often the state
/// was followed by that label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub samples: usize,
    pub by_outcome: Vec<usize>,
}

impl StateCounts {
    fn new(classes: usize) -> Self {
        Self {
            samples: 0,
            by_outcome: vec![0; classes],
        }
    }

    pub fn count(&self, outcome: Label) -> OutcomeCount {
        OutcomeCount {
            samples: self.samples,
            wins: self.by_outcome.get(outcome.index()).copied().unwrap_or(0),
        }
    }
}

/// Counts keyed by state in canonical (lexicographic) order.
///
/// Only states that occurred are present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TransitionCounts {
    states: BTreeMap<StateKey, StateCounts>,
    total: usize,
}

impl TransitionCounts {
    pub fn get(&self, state: &StateKey) -> Option<&StateCounts> {
        self.states.get(state)
    }

    pub fn count(&self, state: &StateKey, outcome: Label) -> OutcomeCount {
        self.states
            .get(state)
            .map(|c| c.count(outcome))
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &StateCounts)> {
        self.states.iter()
    }

    pub fn states(&self) -> impl Iterator<Item = &StateKey> {
        self.states.keys()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Total `(state, outcome)` pairs counted
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Single-pass counter over `(state, outcome)` training pairs
#[derive(Debug, Clone)]
pub struct TransitionCounter {
    classes: usize,
}

impl TransitionCounter {
    pub fn new(alphabet: &OutcomeAlphabet) -> Self {
        Self {
            classes: alphabet.len(),
        }
    }

    pub fn count<'a, I>(&self, pairs: I) -> TransitionCounts
    where
        I: IntoIterator<Item = &'a (StateKey, Label)>,
    {
        let mut counts = TransitionCounts::default();
        for (state, outcome) in pairs {
            let entry = counts
                .states
                .entry(state.clone())
                .or_insert_with(|| StateCounts::new(self.classes));
            entry.samples += 1;
            if let Some(slot) = entry.by_outcome.get_mut(outcome.index()) {
                *slot += 1;
            }
            counts.total += 1;
        }
        counts
    }
}
