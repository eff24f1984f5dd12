use crate::application::pipeline::EstimationPipeline;
use crate::application::rolling::window_manager::{WarmupPolicy, WindowQuality};
use crate::application::snapshot::RollingSnapshot;
use crate::domain::errors::EstimationError;
use crate::domain::estimation::state::StateKey;
use crate::domain::series::observation::ObservationSeries;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Probability of one outcome given one state, with the depth behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub entity: String,
    pub as_of: DateTime<Utc>,
    pub state: StateKey,
    pub outcome: String,
    /// Shrunk probability
    pub probability: f64,
    pub samples: usize,
    pub wins: usize,
    pub p_raw: Option<f64>,
    pub prior: f64,
    /// Beta credible interval; `None` when renormalization rescaled the
    /// multi-class vector
    pub interval: Option<(f64, f64)>,
    /// `samples * |probability - prior|`
    pub confidence: f64,
    pub quality: WindowQuality,
}

impl Estimate {
    /// The state never occurred in the window; `probability` is the prior
    pub fn is_unknown_state(&self) -> bool {
        self.samples == 0
    }
}

/// Point-in-time queries for one domain and one warm-up policy.
///
/// Every call takes an explicit `as_of`; observations dated later never
/// reach the estimate.
#[derive(Debug, Clone)]
pub struct AsOfQuery {
    pipeline: Arc<EstimationPipeline>,
    policy: WarmupPolicy,
}

impl AsOfQuery {
    pub fn new(pipeline: Arc<EstimationPipeline>, policy: WarmupPolicy) -> Self {
        Self { pipeline, policy }
    }

    pub fn policy(&self) -> &WarmupPolicy {
        &self.policy
    }

    pub fn snapshot(
        &self,
        history: &ObservationSeries,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<RollingSnapshot>, EstimationError> {
        self.pipeline
            .snapshot(history, as_of, &self.policy)
            .map(Arc::new)
    }

    /// `P(outcome | state)` as of `as_of`
    pub fn p_outcome(
        &self,
        history: &ObservationSeries,
        as_of: DateTime<Utc>,
        state: &StateKey,
        outcome: &str,
    ) -> Result<Estimate, EstimationError> {
        let label = self.pipeline.alphabet().resolve(outcome)?;
        let snapshot = self.snapshot(history, as_of)?;
        Ok(snapshot.estimate(state, label))
    }

    /// `P(outcome | current state)` as of `as_of`
    pub fn p_current(
        &self,
        history: &ObservationSeries,
        as_of: DateTime<Utc>,
        outcome: &str,
    ) -> Result<Estimate, EstimationError> {
        let label = self.pipeline.alphabet().resolve(outcome)?;
        let snapshot = self.snapshot(history, as_of)?;
        snapshot.current_estimate(label)
    }
}
