//! Outcome binarizer / classifier.
//!
//! Turns a numeric signal into a label of the domain's alphabet. The signal is
//! produced from raw observations by a [`SignalTransform`] so that rules that
//! depend on a short trailing context (an h-bar return, a change versus the
//! previous release) stay pure functions of one value.

use crate::domain::errors::{ConfigError, EstimationError};
use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use crate::domain::series::observation::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cut-point: values `>= min` map to `class` unless a higher bin matched first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    pub min: f64,
    pub class: String,
}

/// Classification rule, as written in a domain config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationRule {
    /// Binary: `value > threshold` is class 1, anything else class 0
    Sign {
        #[serde(default)]
        threshold: f64,
    },
    /// Bins evaluated top-down, strictly descending `min`; `fallback` catches the rest
    CutPoints { bins: Vec<CutPoint>, fallback: String },
}

impl Default for ClassificationRule {
    fn default() -> Self {
        ClassificationRule::Sign { threshold: 0.0 }
    }
}

/// How raw observations become the signal that gets classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTransform {
    /// Classify the observed value itself (macro actuals, match results)
    #[default]
    Level,
    /// `ln(v[t] / v[t-h])`; prices must be positive
    LogReturn,
    /// `v[t] - v[t-h]`
    Difference,
}

impl SignalTransform {
    /// Number of leading observations consumed before the first signal
    pub fn lag(&self, horizon: usize) -> usize {
        match self {
            SignalTransform::Level => 0,
            SignalTransform::LogReturn | SignalTransform::Difference => horizon.max(1),
        }
    }

    /// Signals aligned with `points[lag..]`. Values are returned as computed;
    /// non-finite results are rejected later by the classifier.
    pub fn apply(&self, points: &[Observation], horizon: usize) -> Vec<(DateTime<Utc>, f64)> {
        let lag = self.lag(horizon);
        if points.len() <= lag {
            return Vec::new();
        }

        (lag..points.len())
            .map(|t| {
                let current = points[t].value;
                let signal = match self {
                    SignalTransform::Level => current,
                    SignalTransform::LogReturn => {
                        let base = points[t - lag].value;
                        if current > 0.0 && base > 0.0 {
                            (current / base).ln()
                        } else {
                            f64::NAN
                        }
                    }
                    SignalTransform::Difference => current - points[t - lag].value,
                };
                (points[t].timestamp, signal)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Sign { threshold: f64 },
    CutPoints { bins: Vec<(f64, Label)>, fallback: Label },
}

/// Validated classification rule bound to an alphabet
#[derive(Debug, Clone)]
pub struct Classifier {
    rule: CompiledRule,
}

impl Classifier {
    pub fn new(rule: &ClassificationRule, alphabet: &OutcomeAlphabet) -> Result<Self, ConfigError> {
        let rule = match rule {
            ClassificationRule::Sign { threshold } => {
                if !alphabet.is_binary() {
                    return Err(ConfigError::invalid(
                        "classifier",
                        format!(
                            "sign rule needs a binary alphabet, got {} classes",
                            alphabet.len()
                        ),
                    ));
                }
                if !threshold.is_finite() {
                    return Err(ConfigError::invalid("classifier.threshold", "must be finite"));
                }
                CompiledRule::Sign {
                    threshold: *threshold,
                }
            }
            ClassificationRule::CutPoints { bins, fallback } => {
                let resolve = |name: &str| {
                    alphabet.label_of(name).ok_or_else(|| {
                        ConfigError::invalid(
                            "classifier",
                            format!("class '{}' is not in the alphabet", name),
                        )
                    })
                };

                let mut compiled = Vec::with_capacity(bins.len());
                for (i, bin) in bins.iter().enumerate() {
                    if !bin.min.is_finite() {
                        return Err(ConfigError::invalid("classifier.bins", "min must be finite"));
                    }
                    if i > 0 && bin.min >= bins[i - 1].min {
                        return Err(ConfigError::invalid(
                            "classifier.bins",
                            format!(
                                "cut-points must be strictly descending ({} after {})",
                                bin.min,
                                bins[i - 1].min
                            ),
                        ));
                    }
                    compiled.push((bin.min, resolve(&bin.class)?));
                }

                CompiledRule::CutPoints {
                    bins: compiled,
                    fallback: resolve(fallback)?,
                }
            }
        };

        Ok(Self { rule })
    }

    /// Classifies one finite value. Non-finite input is a data-quality error.
    pub fn classify(&self, timestamp: DateTime<Utc>, value: f64) -> Result<Label, EstimationError> {
        if !value.is_finite() {
            return Err(EstimationError::MalformedObservation {
                timestamp,
                value,
                reason: "non-finite signal".to_string(),
            });
        }

        let label = match &self.rule {
            CompiledRule::Sign { threshold } => {
                if value > *threshold {
                    Label(1)
                } else {
                    Label(0)
                }
            }
            CompiledRule::CutPoints { bins, fallback } => bins
                .iter()
                .find(|(min, _)| value >= *min)
                .map(|(_, label)| *label)
                .unwrap_or(*fallback),
        };

        Ok(label)
    }

    /// Classifies a whole signal series, stopping at the first malformed value.
    pub fn classify_all(
        &self,
        signals: &[(DateTime<Utc>, f64)],
    ) -> Result<Vec<(DateTime<Utc>, Label)>, EstimationError> {
        signals
            .iter()
            .map(|(ts, value)| self.classify(*ts, *value).map(|label| (*ts, label)))
            .collect()
    }
}
