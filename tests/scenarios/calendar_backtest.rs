use crate::common::day;
use chrono::{DateTime, Utc};
use pwin_engine::application::pipeline::EstimationPipeline;
use pwin_engine::application::rolling::window_manager::{WarmupPolicy, WindowQuality};
use pwin_engine::application::snapshot::{SnapshotHistory, rebalance_dates};
use pwin_engine::config::DomainConfig;
use pwin_engine::domain::errors::EstimationError;
use pwin_engine::domain::series::calendar::CalendarPeriod;
use pwin_engine::domain::series::observation::{Observation, ObservationSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn daily_walk(n: usize) -> ObservationSeries {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut price = 50.0f64;
    let points = (0..n)
        .map(|i| {
            price *= (rng.random_range(-0.015..0.016f64)).exp();
            Observation::new(day(i as i64), price)
        })
        .collect();
    ObservationSeries::new("ESTX", points).unwrap()
}

fn pipeline() -> EstimationPipeline {
    EstimationPipeline::new(&DomainConfig::equity_calendar()).unwrap()
}

#[test]
fn test_monthly_backtest_grid() {
    let series = daily_walk(365 * 8);
    let policy = WarmupPolicy::calendar(CalendarPeriod::Monthly);
    let dates = rebalance_dates(&series, CalendarPeriod::Monthly, day(365 * 6), day(365 * 8 - 1));
    assert!(dates.len() >= 23);

    let history = SnapshotHistory::build(&pipeline(), &series, &policy, &dates);
    assert_eq!(history.len(), dates.len());
    assert!(history.failures().is_empty());

    let mut previous: Option<DateTime<Utc>> = None;
    for snapshot in history.iter() {
        assert!(snapshot.last_observation().unwrap() <= snapshot.as_of());
        assert_eq!(snapshot.quality(), WindowQuality::Full);
        assert!(previous.is_none_or(|p| p < snapshot.as_of()));
        previous = Some(snapshot.as_of());
    }

    let p_up = history.favorable_series();
    assert_eq!(p_up.len(), history.len());
    assert!(p_up.iter().all(|(_, e)| e.probability > 0.0 && e.probability < 1.0));
}

#[test]
fn test_early_dates_are_skipped_not_fatal() {
    let series = daily_walk(365 * 3);
    let policy = WarmupPolicy::calendar(CalendarPeriod::Monthly);
    let dates = rebalance_dates(&series, CalendarPeriod::Monthly, day(0), day(365 * 3 - 1));

    let history = SnapshotHistory::build(&pipeline(), &series, &policy, &dates);
    assert!(!history.failures().is_empty());
    assert!(history
        .failures()
        .values()
        .all(|e| matches!(e, EstimationError::InsufficientHistory { .. })));
    assert_eq!(history.len() + history.failures().len(), dates.len());

    // 36 months give 32 pairs, enough to answer but short of the 3y floor span
    let last = history.latest_at(day(365 * 3)).unwrap();
    assert_eq!(last.usable_samples(), 32);
    assert_eq!(last.quality(), WindowQuality::Partial);
}

#[test]
fn test_weekly_calendar_matches_point_in_time_rebuild() {
    let series = daily_walk(365 * 6);
    let policy = WarmupPolicy::calendar(CalendarPeriod::Weekly);
    let dates = rebalance_dates(&series, CalendarPeriod::Weekly, day(365 * 5), day(365 * 5 + 60));
    let p = pipeline();

    let history = SnapshotHistory::build(&p, &series, &policy, &dates);
    for as_of in dates {
        let rebuilt = p.snapshot(&series.truncated(as_of), as_of, &policy).unwrap();
        let stored = history.get(as_of).unwrap();
        assert_eq!(stored.table().entries(), rebuilt.table().entries());
    }
}
