use crate::application::pipeline::EstimationPipeline;
use crate::application::rolling::window_manager::WarmupPolicy;
use crate::application::snapshot::RollingSnapshot;
use crate::domain::errors::EstimationError;
use crate::domain::series::observation::{ObservationSeries, ObservationStore};
use crate::infrastructure::observability::EngineMetrics;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Result of one entity in a batch
#[derive(Debug, Clone)]
pub struct EntityOutcome<T> {
    pub entity: String,
    pub result: Result<T, EstimationError>,
}

impl<T> EntityOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Parallel per-entity runner.
///
/// Entities are independent, so they are spread over a rayon pool while each
/// entity's own pipeline runs sequentially on one worker. Failures are
/// captured per entity; one bad series never stops the batch.
///
/// # Example
///
/// ```no_run
/// use pwin_engine::application::batch::BatchRunner;
/// use pwin_engine::application::pipeline::EstimationPipeline;
/// use pwin_engine::application::rolling::window_manager::WarmupPolicy;
/// use pwin_engine::config::DomainConfig;
/// use pwin_engine::domain::series::observation::ObservationStore;
/// use std::sync::Arc;
/// use chrono::Utc;
///
/// # fn example(store: ObservationStore) -> anyhow::Result<()> {
/// let pipeline = Arc::new(EstimationPipeline::new(&DomainConfig::equity_rolling())?);
/// let runner = BatchRunner::new(pipeline);
///
/// for outcome in runner.snapshots(&store, Utc::now(), &WarmupPolicy::rolling(5)) {
///     match outcome.result {
///         Ok(snapshot) => println!("{}: {} samples", outcome.entity, snapshot.usable_samples()),
///         Err(e) => println!("{}: {}", outcome.entity, e),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct BatchRunner {
    pipeline: Arc<EstimationPipeline>,
    metrics: Option<EngineMetrics>,
    pool: Option<rayon::ThreadPool>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<EstimationPipeline>) -> Self {
        Self {
            pipeline,
            metrics: None,
            pool: None,
        }
    }

    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs on a dedicated pool of `threads` workers instead of the global one
    pub fn with_threads(mut self, threads: usize) -> Self {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pwin-worker-{}", i))
            .build()
        {
            Ok(pool) => self.pool = Some(pool),
            Err(e) => warn!(
                "BatchRunner: could not build a {}-thread pool, using the global pool: {}",
                threads, e
            ),
        }
        self
    }

    pub fn pipeline(&self) -> &Arc<EstimationPipeline> {
        &self.pipeline
    }

    /// Applies `job` to every series of the store in parallel.
    ///
    /// Results come back in entity order regardless of scheduling.
    pub fn run_with<T, F>(&self, store: &ObservationStore, job: F) -> Vec<EntityOutcome<T>>
    where
        T: Send,
        F: Fn(&EstimationPipeline, &ObservationSeries) -> Result<T, EstimationError> + Sync,
    {
        let series: Vec<Arc<ObservationSeries>> = store.iter().collect();
        let started = Instant::now();

        let work = || -> Vec<EntityOutcome<T>> {
            series
                .par_iter()
                .map(|s| {
                    let entity_started = Instant::now();
                    let result = job(self.pipeline.as_ref(), s.as_ref());
                    self.record(s.entity(), &result, entity_started);
                    EntityOutcome {
                        entity: s.entity().to_string(),
                        result,
                    }
                })
                .collect()
        };

        let outcomes = match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        };

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            "BatchRunner[{}]: {} entities in {:.1}ms ({} failed)",
            self.pipeline.domain(),
            outcomes.len(),
            started.elapsed().as_secs_f64() * 1000.0,
            failed
        );
        outcomes
    }

    /// One snapshot per entity as of `as_of`
    pub fn snapshots(
        &self,
        store: &ObservationStore,
        as_of: DateTime<Utc>,
        policy: &WarmupPolicy,
    ) -> Vec<EntityOutcome<Arc<RollingSnapshot>>> {
        let outcomes = self.run_with(store, |pipeline, series| {
            pipeline.snapshot(series, as_of, policy).map(Arc::new)
        });
        if let Some(metrics) = &self.metrics {
            let built = outcomes.iter().filter(|o| o.is_ok()).count();
            metrics.snapshots_built_total.inc_by(built as f64);
        }
        outcomes
    }

    fn record<T>(&self, entity: &str, result: &Result<T, EstimationError>, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_estimation(started.elapsed().as_secs_f64());
        }
        if let Err(e) = result {
            warn!("BatchRunner: {} failed: {}", entity, e);
            if let Some(metrics) = &self.metrics {
                metrics.inc_failure(e.kind());
            }
        }
    }
}
