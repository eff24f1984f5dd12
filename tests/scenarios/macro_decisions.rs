use crate::common::{day, series};
use pwin_engine::application::pipeline::EstimationPipeline;
use pwin_engine::application::query::AsOfQuery;
use pwin_engine::config::DomainConfig;
use pwin_engine::domain::errors::EstimationError;
use pwin_engine::domain::estimation::alphabet::Label;
use pwin_engine::domain::estimation::shrinkage::NormalizationPolicy;
use pwin_engine::domain::estimation::state::StateKey;
use std::sync::Arc;

/// Rate changes in percentage points: hold, hold, hike, hike, hold, cut
const CYCLE: [f64; 6] = [0.0, 0.0, 0.25, 0.25, 0.0, -0.25];

fn decisions(cycles: usize) -> Vec<f64> {
    CYCLE.iter().copied().cycle().take(CYCLE.len() * cycles).collect()
}

fn query(config: &DomainConfig) -> AsOfQuery {
    let pipeline = Arc::new(EstimationPipeline::new(config).unwrap());
    let policy = config.policy_for("event").unwrap();
    AsOfQuery::new(pipeline, policy)
}

#[test]
fn test_three_class_distribution() {
    let config = DomainConfig::macro_three_class();
    let q = query(&config);
    let history = series("FOMC", &decisions(10), 45);
    let as_of = day(59 * 45);

    let snapshot = q.snapshot(&history, as_of).unwrap();
    assert_eq!(snapshot.usable_samples(), 58);

    // (HOLD, HOLD) is always followed by a hike
    let hold_hold = StateKey::new(vec![1, 1]);
    let dist = snapshot.table().distribution(&hold_hold);
    assert_eq!(dist.len(), 3);
    assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(dist[2] > dist[1] && dist[2] > dist[0]);

    let hike = q.p_outcome(&history, as_of, &hold_hold, "HIKE_25").unwrap();
    assert_eq!(hike.p_raw, Some(1.0));
    assert!((hike.probability - dist[2]).abs() < 1e-12);
}

#[test]
fn test_current_state_and_names() {
    let config = DomainConfig::macro_three_class();
    let q = query(&config);
    let history = series("FOMC", &decisions(10), 45);

    let current = q.p_current(&history, day(59 * 45), "HOLD").unwrap();
    assert_eq!(current.state, StateKey::new(vec![1, 0]));
    assert_eq!(current.state.describe(&config.alphabet), "(HOLD,CUT_25)");

    assert!(matches!(
        q.p_current(&history, day(59 * 45), "HIKE_50"),
        Err(EstimationError::UnknownOutcome { .. })
    ));
}

#[test]
fn test_unseen_state_gets_uniform_prior() {
    let config = DomainConfig::macro_three_class();
    let q = query(&config);
    let history = series("FOMC", &decisions(10), 45);

    let snapshot = q.snapshot(&history, day(59 * 45)).unwrap();
    let cut_cut = StateKey::new(vec![0, 0]);
    for label in config.alphabet.labels() {
        let estimate = snapshot.estimate(&cut_cut, label);
        assert!(estimate.is_unknown_state());
        assert!((estimate.probability - 1.0 / 3.0).abs() < 1e-12);
    }
}

#[test]
fn test_independent_normalization_keeps_raw_shrinkage() {
    let mut config = DomainConfig::macro_three_class();
    config.shrinkage.normalization = NormalizationPolicy::Independent;
    let q = query(&config);
    let history = series("FOMC", &decisions(10), 45);

    let snapshot = q.snapshot(&history, day(59 * 45)).unwrap();
    let hold_hold = StateKey::new(vec![1, 1]);
    let cell = snapshot.table().lookup(&hold_hold, Label(2));
    let k = config.shrinkage.strength;
    let n = cell.samples as f64;
    let expected = (n + k / 3.0) / (n + k);
    assert!((cell.p_shrunk - expected).abs() < 1e-12);
}
