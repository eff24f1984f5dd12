use crate::application::pipeline::EstimationPipeline;
use crate::domain::errors::ConfigError;
use crate::domain::estimation::alphabet::Label;
use crate::domain::estimation::classifier::SignalTransform;
use crate::domain::estimation::counter::TransitionCounter;
use crate::domain::estimation::table::OutcomeTable;
use crate::domain::series::observation::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Grid and window of the decision-threshold search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub grid_min: f64,
    pub grid_max: f64,
    pub grid_points: usize,
    /// Returned when the window cannot support a search
    pub fallback: f64,
    /// Trailing bars the search looks at
    pub window_bars: usize,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            grid_min: 0.30,
            grid_max: 0.70,
            grid_points: 21,
            fallback: 0.55,
            window_bars: 63,
        }
    }
}

impl ThresholdSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !unit(self.grid_min) || !unit(self.grid_max) || self.grid_min > self.grid_max {
            return Err(ConfigError::invalid(
                "threshold.grid",
                format!("need 0 <= grid_min <= grid_max <= 1, got {} / {}", self.grid_min, self.grid_max),
            ));
        }
        if self.grid_points < 2 {
            return Err(ConfigError::invalid("threshold.grid_points", "must be >= 2"));
        }
        if !unit(self.fallback) {
            return Err(ConfigError::invalid("threshold.fallback", "must be a probability"));
        }
        if self.window_bars == 0 {
            return Err(ConfigError::invalid("threshold.window_bars", "must be >= 1"));
        }
        Ok(())
    }

    pub fn grid(&self) -> Vec<f64> {
        let step = (self.grid_max - self.grid_min) / (self.grid_points - 1) as f64;
        (0..self.grid_points)
            .map(|i| self.grid_min + step * i as f64)
            .collect()
    }
}

/// Cumulative log wealth of going long when `p >= threshold` and short otherwise
fn log_wealth(series: &[(f64, f64)], threshold: f64) -> f64 {
    series
        .iter()
        .map(|(p, r)| {
            let sign = if *p >= threshold { 1.0 } else { -1.0 };
            let gross = 1.0 + sign * r;
            if gross > 0.0 { gross.ln() } else { f64::NEG_INFINITY }
        })
        .sum()
}

/// In-window `p_up` of each training position, paired with the one-bar log
/// return realised at that position.
fn probability_return_series(pipeline: &EstimationPipeline, window: &[Observation]) -> Option<Vec<(f64, f64)>> {
    let favorable = pipeline.alphabet().favorable()?;
    let labeled = pipeline.labels(window, 1).ok()?;
    let labels: Vec<Label> = labeled.iter().map(|(_, l)| *l).collect();
    let encoder = pipeline.encoder();

    let pairs = encoder.pairs(&labels);
    if pairs.is_empty() {
        return None;
    }
    let counts = TransitionCounter::new(pipeline.alphabet()).count(&pairs);
    let table = OutcomeTable::build(counts, pipeline.alphabet(), pipeline.shrinkage());

    let returns: BTreeMap<DateTime<Utc>, f64> = SignalTransform::LogReturn
        .apply(window, 1)
        .into_iter()
        .filter(|(_, r)| r.is_finite())
        .collect();

    let series: Vec<(f64, f64)> = (encoder.required_history()..labels.len())
        .filter_map(|p| {
            let state = encoder.encode(&labels, p)?;
            let r = returns.get(&labeled[p].0)?;
            Some((table.lookup(&state, favorable).p_shrunk, *r))
        })
        .collect();

    (!series.is_empty()).then_some(series)
}

/// Grid-searches the decision threshold on the trailing window of `points`.
///
/// `points` must already be cut at the as-of date; only the last
/// `window_bars` (plus the bars needed to form the first state) are used.
pub fn optimize_threshold(
    pipeline: &EstimationPipeline,
    points: &[Observation],
    settings: &ThresholdSettings,
) -> f64 {
    let needed = settings.window_bars + pipeline.encoder().required_history() + 2;
    let window = &points[points.len().saturating_sub(needed)..];

    let Some(series) = probability_return_series(pipeline, window) else {
        debug!(
            "Threshold: {} bars cannot support a search, using {:.2}",
            window.len(),
            settings.fallback
        );
        return settings.fallback;
    };

    let mut best = (settings.fallback, f64::NEG_INFINITY);
    for threshold in settings.grid() {
        let perf = log_wealth(&series, threshold);
        if perf > best.1 {
            best = (threshold, perf);
        }
    }
    best.0
}
