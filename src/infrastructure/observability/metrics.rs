//! Prometheus metrics for the estimation engine
//!
//! All metrics use the `pwin_` prefix. Nothing is served over HTTP; callers
//! render the registry in text format when they want to ship it.

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Engine counters shared by every batch worker
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Arc<Registry>,
    /// Snapshots built successfully
    pub snapshots_built_total: Counter,
    /// Entities whose estimation failed, by error kind
    pub entity_failures_total: CounterVec,
    /// Wall time of one entity's estimation
    pub estimation_seconds: Histogram,
}

impl EngineMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let snapshots_built_total = Counter::with_opts(Opts::new(
            "pwin_snapshots_built_total",
            "Total outcome-table snapshots built",
        ))?;
        registry.register(Box::new(snapshots_built_total.clone()))?;

        let entity_failures_total = CounterVec::new(
            Opts::new(
                "pwin_entity_failures_total",
                "Entities whose estimation failed, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(entity_failures_total.clone()))?;

        let estimation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pwin_estimation_seconds",
                "Per-entity estimation time in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0,
            ]),
        )?;
        registry.register(Box::new(estimation_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            snapshots_built_total,
            entity_failures_total,
            estimation_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_snapshots(&self) {
        self.snapshots_built_total.inc();
    }

    pub fn inc_failure(&self, kind: &str) {
        self.entity_failures_total.with_label_values(&[kind]).inc();
    }

    pub fn observe_estimation(&self, seconds: f64) {
        self.estimation_seconds.observe(seconds);
    }
}
