use crate::domain::errors::ConfigError;
use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conditioning key: a fixed-length tuple compared by value.
///
/// Ordering is lexicographic on the components, which is the canonical order
/// for emitting tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(Vec<i32>);

impl StateKey {
    pub fn new(parts: Vec<i32>) -> Self {
        Self(parts)
    }

    pub fn from_labels(labels: &[Label]) -> Self {
        Self(labels.iter().map(|l| l.0 as i32).collect())
    }

    /// Concatenates independently computed sub-features (e.g. relative form
    /// and home advantage). A missing sub-feature leaves the state undefined.
    pub fn compose(parts: &[Option<StateKey>]) -> Option<StateKey> {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(&part.as_ref()?.0);
        }
        Some(StateKey(out))
    }

    pub fn parts(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders label components with their class names, e.g. `(STALL,EXPANSION)`
    pub fn describe(&self, alphabet: &OutcomeAlphabet) -> String {
        let names: Vec<&str> = self
            .0
            .iter()
            .map(|p| match u8::try_from(*p) {
                Ok(i) => alphabet.name(Label(i)),
                Err(_) => "?",
            })
            .collect();
        format!("({})", names.join(","))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "({})", parts.join(","))
    }
}

impl From<Vec<i32>> for StateKey {
    fn from(parts: Vec<i32>) -> Self {
        StateKey(parts)
    }
}

/// Maps the K labels preceding a target position to a [`StateKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEncoder {
    k: usize,
    ahead: usize,
}

impl StateEncoder {
    /// `k` labels per state, predicting the label `ahead` steps after the
    /// newest label of the state.
    pub fn new(k: usize, ahead: usize) -> Result<Self, ConfigError> {
        if k == 0 {
            return Err(ConfigError::invalid("state.k", "must be >= 1"));
        }
        if ahead == 0 {
            return Err(ConfigError::invalid("state.ahead", "must be >= 1"));
        }
        Ok(Self { k, ahead })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn ahead(&self) -> usize {
        self.ahead
    }

    /// Minimum number of labels that must precede a target position
    pub fn required_history(&self) -> usize {
        self.k + self.ahead - 1
    }

    /// State conditioning the label at `position`, or `None` when fewer than
    /// `k` labels exist before it. `position` may equal `labels.len()` to get
    /// the state for the next, not yet observed, label.
    pub fn encode(&self, labels: &[Label], position: usize) -> Option<StateKey> {
        if position < self.required_history() || position > labels.len() + self.ahead - 1 {
            return None;
        }
        let end = position + 1 - self.ahead;
        let start = end - self.k;
        Some(StateKey::from_labels(&labels[start..end]))
    }

    /// All well-formed `(state, outcome)` training pairs of a label sequence
    pub fn pairs(&self, labels: &[Label]) -> Vec<(StateKey, Label)> {
        (self.required_history()..labels.len())
            .filter_map(|p| self.encode(labels, p).map(|s| (s, labels[p])))
            .collect()
    }

    /// State for the first label after the end of the sequence
    pub fn current(&self, labels: &[Label]) -> Option<StateKey> {
        self.encode(labels, labels.len())
    }

    /// Number of distinct states over an alphabet of the given size
    pub fn state_space(&self, alphabet_len: usize) -> usize {
        alphabet_len.saturating_pow(self.k as u32)
    }
}

/// Sports "form" sub-feature: 1 when at least `min_wins` of the last
/// `lookback` results were wins, 0 otherwise; undefined until `lookback`
/// results exist.
pub fn form_indicator(results: &[bool], lookback: usize, min_wins: usize) -> Option<StateKey> {
    if lookback == 0 || results.len() < lookback {
        return None;
    }
    let wins = results[results.len() - lookback..]
        .iter()
        .filter(|won| **won)
        .count();
    Some(StateKey(vec![i32::from(wins >= min_wins)]))
}

/// Own form minus the opponent's form, in `{-1, 0, 1}`; undefined until both
/// sides have `lookback` results.
pub fn relative_form(
    own: &[bool],
    opponent: &[bool],
    lookback: usize,
    min_wins: usize,
) -> Option<StateKey> {
    let own = form_indicator(own, lookback, min_wins)?;
    let opponent = form_indicator(opponent, lookback, min_wins)?;
    Some(StateKey(vec![own.0[0] - opponent.0[0]]))
}
