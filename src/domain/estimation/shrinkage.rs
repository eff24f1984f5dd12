//! Empirical-Bayes shrinkage toward a prior.
//!
//! `shrink(p_raw, n, prior, k) = (p_raw * n + prior * k) / (n + k)` is the
//! posterior mean of a `Beta(prior * k + wins, (1 - prior) * k + n - wins)`,
//! which is also what [`credible_interval`] reports around it.

use crate::domain::errors::ConfigError;
use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use crate::domain::estimation::counter::StateCounts;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use std::collections::BTreeMap;

/// Pulls `p_raw` observed over `samples` toward `prior` with pseudo-count `strength`.
///
/// Returns `prior` exactly when there are no samples, and never leaves the
/// interval spanned by `p_raw` and `prior`.
pub fn shrink(p_raw: f64, samples: usize, prior: f64, strength: f64) -> f64 {
    if samples == 0 {
        return prior;
    }
    let n = samples as f64;
    let shrunk = (p_raw * n + prior * strength) / (n + strength);
    shrunk.clamp(p_raw.min(prior), p_raw.max(prior))
}

/// Equal-tailed Beta credible interval around the shrunk estimate of
/// `wins` out of `samples`. `None` when the posterior is improper (no samples
/// and zero strength) or `level` is outside `(0, 1)`.
pub fn credible_interval(
    wins: usize,
    samples: usize,
    prior: f64,
    strength: f64,
    level: f64,
) -> Option<(f64, f64)> {
    if !(level > 0.0 && level < 1.0) {
        return None;
    }
    let alpha = wins as f64 + prior * strength;
    let beta = samples.saturating_sub(wins) as f64 + (1.0 - prior) * strength;
    let dist = Beta::new(alpha, beta).ok()?;
    let tail = (1.0 - level) / 2.0;
    Some((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
}

const PRIOR_SUM_TOLERANCE: f64 = 1e-9;

/// Prior probability each class is pulled toward
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prior {
    /// `1 / |alphabet|` for every class
    #[default]
    Uniform,
    /// Prior of the favorable class of a binary alphabet (the other class gets the complement)
    Fixed { value: f64 },
    /// One prior per named class
    PerClass { values: BTreeMap<String, f64> },
}

/// How a multi-class state's shrunk vector is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Rescale so the shrunk probabilities of a state sum to 1
    #[default]
    Renormalize,
    /// Keep each class's shrunk value as computed
    Independent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShrinkageParams {
    #[serde(default)]
    pub prior: Prior,
    /// Pseudo-count `k`
    pub strength: f64,
    #[serde(default)]
    pub normalization: NormalizationPolicy,
}

impl Default for ShrinkageParams {
    fn default() -> Self {
        Self {
            prior: Prior::Uniform,
            strength: 20.0,
            normalization: NormalizationPolicy::Renormalize,
        }
    }
}

impl ShrinkageParams {
    pub fn new(prior: Prior, strength: f64) -> Self {
        Self {
            prior,
            strength,
            normalization: NormalizationPolicy::default(),
        }
    }

    pub fn with_normalization(mut self, normalization: NormalizationPolicy) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn validate(&self, alphabet: &OutcomeAlphabet) -> Result<(), ConfigError> {
        if !self.strength.is_finite() || self.strength < 0.0 {
            return Err(ConfigError::invalid(
                "shrinkage.strength",
                format!("must be finite and >= 0, got {}", self.strength),
            ));
        }

        let in_unit = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        match &self.prior {
            Prior::Uniform => {}
            Prior::Fixed { value } => {
                if !alphabet.is_binary() {
                    return Err(ConfigError::invalid(
                        "shrinkage.prior",
                        "fixed prior needs a binary alphabet, use per_class",
                    ));
                }
                if !in_unit(*value) {
                    return Err(ConfigError::invalid(
                        "shrinkage.prior",
                        format!("{} is not a probability", value),
                    ));
                }
            }
            Prior::PerClass { values } => {
                for class in alphabet.classes() {
                    match values.get(class) {
                        Some(p) if in_unit(*p) => {}
                        Some(p) => {
                            return Err(ConfigError::invalid(
                                "shrinkage.prior",
                                format!("prior {} for '{}' is not a probability", p, class),
                            ));
                        }
                        None => {
                            return Err(ConfigError::invalid(
                                "shrinkage.prior",
                                format!("missing prior for class '{}'", class),
                            ));
                        }
                    }
                }
                if let Some(extra) = values.keys().find(|k| alphabet.label_of(k).is_none()) {
                    return Err(ConfigError::invalid(
                        "shrinkage.prior",
                        format!("class '{}' is not in the alphabet", extra),
                    ));
                }
                let total: f64 = values.values().sum();
                if alphabet.is_binary() && (total - 1.0).abs() > PRIOR_SUM_TOLERANCE {
                    return Err(ConfigError::invalid(
                        "shrinkage.prior",
                        format!("binary priors must sum to 1, got {}", total),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Prior of one class. Assumes [`validate`](Self::validate) passed.
    pub fn prior_for(&self, label: Label, alphabet: &OutcomeAlphabet) -> f64 {
        match &self.prior {
            Prior::Uniform => alphabet.uniform_prior(),
            Prior::Fixed { value } => {
                if alphabet.favorable() == Some(label) {
                    *value
                } else {
                    1.0 - *value
                }
            }
            Prior::PerClass { values } => values
                .get(alphabet.name(label))
                .copied()
                .unwrap_or_else(|| alphabet.uniform_prior()),
        }
    }

    /// Whether `Renormalize` rescales the shrunk vector, i.e. a multi-class
    /// alphabet whose priors do not sum to 1.
    pub fn rescales(&self, alphabet: &OutcomeAlphabet) -> bool {
        if alphabet.is_binary() || self.normalization != NormalizationPolicy::Renormalize {
            return false;
        }
        let total: f64 = alphabet.labels().map(|l| self.prior_for(l, alphabet)).sum();
        (total - 1.0).abs() > PRIOR_SUM_TOLERANCE
    }

    /// Shrunk probability of every class of the alphabet for one state.
    ///
    /// `None` counts (an unseen state) yield the priors. Binary alphabets shrink
    /// the favorable class and take the exact complement for the other one.
    pub fn distribution(&self, counts: Option<&StateCounts>, alphabet: &OutcomeAlphabet) -> Vec<f64> {
        let samples = counts.map(|c| c.samples).unwrap_or(0);
        let raw = |label: Label| match counts {
            Some(c) if c.samples > 0 => c.count(label).wins as f64 / c.samples as f64,
            _ => 0.0,
        };

        if let Some(favorable) = alphabet.favorable() {
            let p = shrink(
                raw(favorable),
                samples,
                self.prior_for(favorable, alphabet),
                self.strength,
            );
            let mut out = vec![0.0; 2];
            out[favorable.index()] = p;
            out[1 - favorable.index()] = 1.0 - p;
            return out;
        }

        let mut out: Vec<f64> = alphabet
            .labels()
            .map(|label| shrink(raw(label), samples, self.prior_for(label, alphabet), self.strength))
            .collect();

        if self.normalization == NormalizationPolicy::Renormalize {
            let total: f64 = out.iter().sum();
            if total > 0.0 {
                out.iter_mut().for_each(|p| *p /= total);
            }
        }
        out
    }
}
