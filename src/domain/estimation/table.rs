use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use crate::domain::estimation::counter::TransitionCounts;
use crate::domain::estimation::shrinkage::{ShrinkageParams, credible_interval};
use crate::domain::estimation::state::StateKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// One exported row of an outcome table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeEntry {
    pub state: String,
    pub outcome: String,
    pub samples: usize,
    pub wins: usize,
    pub p_raw: f64,
    pub p_shrunk: f64,
}

/// Result of looking up a single `(state, outcome)` cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableCell {
    pub samples: usize,
    pub wins: usize,
    /// `None` for a state never observed in the window
    pub p_raw: Option<f64>,
    pub p_shrunk: f64,
    pub prior: f64,
}

/// Shrunk conditional probabilities of every observed state.
///
/// Rows are emitted in canonical order: state lexicographically, then outcome
/// by alphabet index.
#[derive(Debug, Clone)]
pub struct OutcomeTable {
    alphabet: OutcomeAlphabet,
    params: ShrinkageParams,
    counts: TransitionCounts,
    shrunk: BTreeMap<StateKey, Vec<f64>>,
}

impl OutcomeTable {
    pub fn build(counts: TransitionCounts, alphabet: &OutcomeAlphabet, params: &ShrinkageParams) -> Self {
        let shrunk = counts
            .iter()
            .map(|(state, c)| (state.clone(), params.distribution(Some(c), alphabet)))
            .collect();

        Self {
            alphabet: alphabet.clone(),
            params: params.clone(),
            counts,
            shrunk,
        }
    }

    pub fn alphabet(&self) -> &OutcomeAlphabet {
        &self.alphabet
    }

    pub fn params(&self) -> &ShrinkageParams {
        &self.params
    }

    pub fn counts(&self) -> &TransitionCounts {
        &self.counts
    }

    pub fn prior(&self, outcome: Label) -> f64 {
        self.params.prior_for(outcome, &self.alphabet)
    }

    /// Unknown states resolve to the zero-sample distribution, i.e. the
    /// (complemented or renormalized) prior.
    pub fn lookup(&self, state: &StateKey, outcome: Label) -> TableCell {
        let count = self.counts.count(state, outcome);
        let prior = self.prior(outcome);
        let p_shrunk = self
            .distribution(state)
            .get(outcome.index())
            .copied()
            .unwrap_or(prior);

        TableCell {
            samples: count.samples,
            wins: count.wins,
            p_raw: count.p_raw(),
            p_shrunk,
            prior,
        }
    }

    /// Shrunk probability of every class for one state
    pub fn distribution(&self, state: &StateKey) -> Vec<f64> {
        match self.shrunk.get(state) {
            Some(dist) => dist.clone(),
            None => self.params.distribution(None, &self.alphabet),
        }
    }

    /// Beta credible interval of one cell at the given level.
    ///
    /// `None` when renormalization rescales the shrunk vector, since the Beta
    /// posterior no longer matches the reported probability.
    pub fn interval(&self, state: &StateKey, outcome: Label, level: f64) -> Option<(f64, f64)> {
        if self.params.rescales(&self.alphabet) {
            return None;
        }
        let count = self.counts.count(state, outcome);
        credible_interval(
            count.wins,
            count.samples,
            self.prior(outcome),
            self.params.strength,
            level,
        )
    }

    pub fn entries(&self) -> Vec<OutcomeEntry> {
        let mut rows = Vec::with_capacity(self.shrunk.len() * self.alphabet.len());
        for (state, counts) in self.counts.iter() {
            let dist = &self.shrunk[state];
            for label in self.alphabet.labels() {
                let count = counts.count(label);
                rows.push(OutcomeEntry {
                    state: state.to_string(),
                    outcome: self.alphabet.name(label).to_string(),
                    samples: count.samples,
                    wins: count.wins,
                    p_raw: count.p_raw().unwrap_or(0.0),
                    p_shrunk: dist[label.index()],
                });
            }
        }
        rows
    }

    pub fn states(&self) -> impl Iterator<Item = &StateKey> {
        self.shrunk.keys()
    }

    pub fn state_count(&self) -> usize {
        self.shrunk.len()
    }

    /// Usable `(state, outcome)` pairs the table was estimated from
    pub fn total_samples(&self) -> usize {
        self.counts.total()
    }
}
