use crate::application::rolling::window_manager::{WarmupPolicy, select_window};
use crate::application::snapshot::RollingSnapshot;
use crate::config::DomainConfig;
use crate::domain::errors::{ConfigError, EstimationError};
use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
use crate::domain::estimation::classifier::{Classifier, SignalTransform};
use crate::domain::estimation::counter::TransitionCounter;
use crate::domain::estimation::shrinkage::ShrinkageParams;
use crate::domain::estimation::state::{StateEncoder, StateKey};
use crate::domain::estimation::table::OutcomeTable;
use crate::domain::series::observation::{Observation, ObservationSeries};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Binarize -> encode -> count -> shrink for one domain.
///
/// Holds only validated, immutable configuration so one instance can be shared
/// by every worker of a batch.
#[derive(Debug, Clone)]
pub struct EstimationPipeline {
    domain: String,
    alphabet: OutcomeAlphabet,
    classifier: Classifier,
    transform: SignalTransform,
    encoder: StateEncoder,
    shrinkage: ShrinkageParams,
    min_samples: usize,
    interval_level: f64,
}

impl EstimationPipeline {
    pub fn new(config: &DomainConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            domain: config.name.clone(),
            alphabet: config.alphabet.clone(),
            classifier: Classifier::new(&config.classifier, &config.alphabet)?,
            transform: config.transform,
            encoder: StateEncoder::new(config.state.k, config.state.ahead)?,
            shrinkage: config.shrinkage.clone(),
            min_samples: config.min_samples,
            interval_level: config.interval_level,
        })
    }

    /// Overrides the minimum sample floor (environment override)
    pub fn with_min_samples(mut self, min_samples: usize) -> Result<Self, ConfigError> {
        if min_samples == 0 {
            return Err(ConfigError::invalid("min_samples", "must be >= 1"));
        }
        self.min_samples = min_samples;
        Ok(self)
    }

    /// Overrides the shrinkage pseudo-count (environment override)
    pub fn with_shrink_strength(mut self, strength: f64) -> Result<Self, ConfigError> {
        let mut shrinkage = self.shrinkage.clone();
        shrinkage.strength = strength;
        shrinkage.validate(&self.alphabet)?;
        self.shrinkage = shrinkage;
        Ok(self)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn alphabet(&self) -> &OutcomeAlphabet {
        &self.alphabet
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn shrinkage(&self) -> &ShrinkageParams {
        &self.shrinkage
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn interval_level(&self) -> f64 {
        self.interval_level
    }

    /// Transformed signal of every observation that has enough trailing context
    pub fn signals(&self, points: &[Observation], horizon: usize) -> Vec<(DateTime<Utc>, f64)> {
        self.transform.apply(points, horizon)
    }

    /// Labels aligned with their observation timestamps
    pub fn labels(
        &self,
        points: &[Observation],
        horizon: usize,
    ) -> Result<Vec<(DateTime<Utc>, Label)>, EstimationError> {
        self.classifier.classify_all(&self.signals(points, horizon))
    }

    /// Counts and shrinks pre-built `(state, outcome)` pairs, e.g. composite
    /// sports states, enforcing the minimum sample floor.
    pub fn table_from_pairs(&self, pairs: &[(StateKey, Label)]) -> Result<OutcomeTable, EstimationError> {
        if let Some((_, outcome)) = pairs.iter().find(|(_, l)| !self.alphabet.contains(*l)) {
            return Err(EstimationError::UnknownOutcome {
                name: outcome.to_string(),
            });
        }
        self.check_floor(pairs.len())?;
        let counts = TransitionCounter::new(&self.alphabet).count(pairs);
        Ok(OutcomeTable::build(counts, &self.alphabet, &self.shrinkage))
    }

    fn check_floor(&self, usable: usize) -> Result<(), EstimationError> {
        if usable < self.min_samples {
            return Err(EstimationError::InsufficientHistory {
                usable,
                floor: self.min_samples,
            });
        }
        Ok(())
    }

    /// Builds the snapshot of `history` as of `as_of` under `policy`.
    pub fn snapshot(
        &self,
        history: &ObservationSeries,
        as_of: DateTime<Utc>,
        policy: &WarmupPolicy,
    ) -> Result<RollingSnapshot, EstimationError> {
        let window = select_window(history, as_of, policy);
        let labeled = self.labels(&window.points, policy.signal_horizon())?;
        let labels: Vec<Label> = labeled.iter().map(|(_, l)| *l).collect();

        let pairs = self.encoder.pairs(&labels);
        self.check_floor(pairs.len())?;

        let counts = TransitionCounter::new(&self.alphabet).count(&pairs);
        let table = OutcomeTable::build(counts, &self.alphabet, &self.shrinkage);
        let current_state = self.encoder.current(&labels);

        let last_observation = window.last_observation();
        debug_assert!(last_observation.is_none_or(|ts| ts <= as_of));

        debug!(
            "Pipeline[{}]: {} as of {} -> {} pairs, {} states, current {}",
            self.domain,
            history.entity(),
            as_of.format("%Y-%m-%d"),
            pairs.len(),
            table.state_count(),
            current_state
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "undefined".to_string())
        );

        Ok(RollingSnapshot::new(
            history.entity(),
            policy.clone(),
            &window,
            labels.len(),
            self.encoder.required_history(),
            current_state,
            table,
            self.interval_level,
        ))
    }
}
