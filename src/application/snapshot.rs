use crate::application::pipeline::EstimationPipeline;
use crate::application::query::Estimate;
use crate::application::rolling::window_manager::{WarmupPolicy, WarmupWindow, WindowQuality};
use crate::domain::errors::EstimationError;
use crate::domain::estimation::alphabet::Label;
use crate::domain::estimation::state::StateKey;
use crate::domain::estimation::table::OutcomeTable;
use crate::domain::series::calendar::CalendarPeriod;
use crate::domain::series::observation::ObservationSeries;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome table of one entity as of one date under one warm-up policy.
///
/// Never mutated after construction; share it as `Arc<RollingSnapshot>`.
#[derive(Debug, Clone)]
pub struct RollingSnapshot {
    entity: String,
    policy: WarmupPolicy,
    as_of: DateTime<Utc>,
    quality: WindowQuality,
    window_start: Option<DateTime<Utc>>,
    last_observation: Option<DateTime<Utc>>,
    label_count: usize,
    required_history: usize,
    current_state: Option<StateKey>,
    table: OutcomeTable,
    interval_level: f64,
}

impl RollingSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entity: &str,
        policy: WarmupPolicy,
        window: &WarmupWindow,
        label_count: usize,
        required_history: usize,
        current_state: Option<StateKey>,
        table: OutcomeTable,
        interval_level: f64,
    ) -> Self {
        Self {
            entity: entity.to_string(),
            policy,
            as_of: window.as_of,
            quality: window.quality,
            window_start: window.start(),
            last_observation: window.last_observation(),
            label_count,
            required_history,
            current_state,
            table,
            interval_level,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn policy(&self) -> &WarmupPolicy {
        &self.policy
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn quality(&self) -> WindowQuality {
        self.quality
    }

    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start
    }

    /// Timestamp of the newest observation that fed the table (`<= as_of`)
    pub fn last_observation(&self) -> Option<DateTime<Utc>> {
        self.last_observation
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }

    pub fn usable_samples(&self) -> usize {
        self.table.total_samples()
    }

    /// State formed by the newest labels, i.e. the one the next outcome is conditioned on
    pub fn current_state(&self) -> Option<&StateKey> {
        self.current_state.as_ref()
    }

    pub fn table(&self) -> &OutcomeTable {
        &self.table
    }

    /// Estimate for an explicit state. Unseen states return the prior with zero samples.
    pub fn estimate(&self, state: &StateKey, outcome: Label) -> Estimate {
        let cell = self.table.lookup(state, outcome);
        let interval = self.table.interval(state, outcome, self.interval_level);
        Estimate {
            entity: self.entity.clone(),
            as_of: self.as_of,
            state: state.clone(),
            outcome: self.table.alphabet().name(outcome).to_string(),
            probability: cell.p_shrunk,
            samples: cell.samples,
            wins: cell.wins,
            p_raw: cell.p_raw,
            prior: cell.prior,
            interval,
            confidence: cell.samples as f64 * (cell.p_shrunk - cell.prior).abs(),
            quality: self.quality,
        }
    }

    /// Estimate for the current state
    pub fn current_estimate(&self, outcome: Label) -> Result<Estimate, EstimationError> {
        let state = self
            .current_state
            .as_ref()
            .ok_or(EstimationError::UndefinedState {
                available: self.label_count,
                required: self.required_history,
            })?;
        Ok(self.estimate(state, outcome))
    }

    /// `p_up` / `p_win`: current-state estimate of the favorable class of a binary alphabet
    pub fn favorable_estimate(&self) -> Result<Estimate, EstimationError> {
        let favorable =
            self.table
                .alphabet()
                .favorable()
                .ok_or_else(|| EstimationError::UnknownOutcome {
                    name: "favorable class of a non-binary alphabet".to_string(),
                })?;
        self.current_estimate(favorable)
    }
}

/// As-of dates: the last observation of every calendar period in `[start, end]`
pub fn rebalance_dates(
    series: &ObservationSeries,
    period: CalendarPeriod,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    period.period_ends(series.observations(), start, end)
}

/// Point-in-time snapshots of one entity, keyed by as-of date.
///
/// Adding a snapshot produces a new history sharing the existing `Arc`s; a
/// published snapshot is never modified.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    entity: String,
    snapshots: BTreeMap<DateTime<Utc>, Arc<RollingSnapshot>>,
    failures: BTreeMap<DateTime<Utc>, EstimationError>,
}

impl SnapshotHistory {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Builds one snapshot per as-of date. Dates that cannot be answered
    /// (typically the first ones, before the sample floor is reached) are
    /// recorded as failures rather than aborting the run.
    pub fn build(
        pipeline: &EstimationPipeline,
        series: &ObservationSeries,
        policy: &WarmupPolicy,
        dates: &[DateTime<Utc>],
    ) -> Self {
        let mut history = Self::new(series.entity());
        for as_of in dates {
            match pipeline.snapshot(series, *as_of, policy) {
                Ok(snapshot) => {
                    history.snapshots.insert(*as_of, Arc::new(snapshot));
                }
                Err(e) => {
                    debug!(
                        "SnapshotHistory: {} as of {} skipped: {}",
                        series.entity(),
                        as_of.format("%Y-%m-%d"),
                        e
                    );
                    history.failures.insert(*as_of, e);
                }
            }
        }

        info!(
            "SnapshotHistory: {} built {} snapshots ({} skipped) under {}",
            series.entity(),
            history.snapshots.len(),
            history.failures.len(),
            policy
        );
        history
    }

    /// Copy-on-recompute: returns a new history including `snapshot`
    pub fn with_snapshot(&self, snapshot: Arc<RollingSnapshot>) -> Self {
        let mut next = self.clone();
        next.failures.remove(&snapshot.as_of());
        next.snapshots.insert(snapshot.as_of(), snapshot);
        next
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, as_of: DateTime<Utc>) -> Option<Arc<RollingSnapshot>> {
        self.snapshots.get(&as_of).cloned()
    }

    /// Most recent snapshot whose as-of date is `<= at`
    pub fn latest_at(&self, at: DateTime<Utc>) -> Option<Arc<RollingSnapshot>> {
        self.snapshots
            .range(..=at)
            .next_back()
            .map(|(_, s)| s.clone())
    }

    pub fn failures(&self) -> &BTreeMap<DateTime<Utc>, EstimationError> {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RollingSnapshot>> {
        self.snapshots.values()
    }

    /// Favorable-class estimate at every snapshot that has a current state
    pub fn favorable_series(&self) -> Vec<(DateTime<Utc>, Estimate)> {
        self.snapshots
            .iter()
            .filter_map(|(ts, s)| s.favorable_estimate().ok().map(|e| (*ts, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::domain::series::observation::Observation;
    use chrono::{Duration, TimeZone};

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap() + Duration::days(offset)
    }

    /// Deterministic zig-zag price path with a mild drift
    fn price_series(n: usize) -> ObservationSeries {
        let points = (0..n)
            .map(|i| {
                let wiggle = if (i * 7) % 5 < 2 { -0.8 } else { 1.0 };
                Observation::new(day(i as i64), 100.0 + i as f64 * 0.05 + wiggle)
            })
            .collect();
        ObservationSeries::new("SPX", points).unwrap()
    }

    fn pipeline(min_samples: usize) -> EstimationPipeline {
        EstimationPipeline::new(&DomainConfig::equity_rolling())
            .unwrap()
            .with_min_samples(min_samples)
            .unwrap()
    }

    #[test]
    fn test_estimate_carries_depth_and_confidence() {
        let series = price_series(200);
        let snapshot = pipeline(30)
            .snapshot(&series, day(199), &WarmupPolicy::rolling(1))
            .unwrap();

        let estimate = snapshot.favorable_estimate().unwrap();
        assert!(estimate.samples > 0);
        assert!(estimate.probability > 0.0 && estimate.probability < 1.0);
        let expected = estimate.samples as f64 * (estimate.probability - 0.5).abs();
        assert!((estimate.confidence - expected).abs() < 1e-12);
        let (lo, hi) = estimate.interval.unwrap();
        assert!(lo <= estimate.probability && estimate.probability <= hi);
    }

    #[test]
    fn test_unknown_state_estimate() {
        let series = price_series(200);
        let snapshot = pipeline(30)
            .snapshot(&series, day(199), &WarmupPolicy::rolling(1))
            .unwrap();

        let estimate = snapshot.estimate(&StateKey::new(vec![9, 9, 9]), Label(1));
        assert!(estimate.is_unknown_state());
        assert_eq!(estimate.probability, 0.5);
        assert_eq!(estimate.confidence, 0.0);
    }

    #[test]
    fn test_current_estimate_without_state() {
        let built = pipeline(30)
            .snapshot(&price_series(200), day(199), &WarmupPolicy::rolling(1))
            .unwrap();
        let window = WarmupWindow {
            as_of: day(199),
            points: Vec::new(),
            quality: WindowQuality::Partial,
        };
        let stateless = RollingSnapshot::new(
            "SPX",
            WarmupPolicy::rolling(1),
            &window,
            2,
            3,
            None,
            built.table().clone(),
            0.9,
        );

        assert!(matches!(
            stateless.current_estimate(Label(1)),
            Err(EstimationError::UndefinedState {
                available: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn test_history_records_early_failures() {
        let series = price_series(120);
        let dates: Vec<DateTime<Utc>> = (0..120).step_by(10).map(day).collect();
        let history = SnapshotHistory::build(&pipeline(30), &series, &WarmupPolicy::rolling(1), &dates);

        assert!(history.failures().contains_key(&day(0)));
        assert!(history.get(day(110)).is_some());
        assert_eq!(history.len() + history.failures().len(), dates.len());

        let latest = history.latest_at(day(115)).unwrap();
        assert_eq!(latest.as_of(), day(110));
        assert!(history.latest_at(day(0)).is_none());
    }

    #[test]
    fn test_with_snapshot_leaves_original_untouched() {
        let series = price_series(120);
        let p = pipeline(30);
        let history = SnapshotHistory::build(&p, &series, &WarmupPolicy::rolling(1), &[day(100)]);
        let before = history.get(day(100)).unwrap();

        let extra = Arc::new(p.snapshot(&series, day(119), &WarmupPolicy::rolling(1)).unwrap());
        let next = history.with_snapshot(extra);

        assert_eq!(history.len(), 1);
        assert_eq!(next.len(), 2);
        assert!(Arc::ptr_eq(&before, &next.get(day(100)).unwrap()));
    }

    #[test]
    fn test_rebalance_dates_are_month_ends() {
        let series = price_series(120);
        let dates = rebalance_dates(&series, CalendarPeriod::Monthly, day(0), day(119));
        // Jan 4 .. May 3 2021: ends of Jan-Apr plus the open May period
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2021, 1, 31, 0, 0, 0).unwrap());
    }
}
