use crate::common::{day, series};
use pwin_engine::application::pipeline::EstimationPipeline;
use pwin_engine::application::query::AsOfQuery;
use pwin_engine::application::rolling::window_manager::WarmupPolicy;
use pwin_engine::config::{DomainConfig, StateConfig};
use pwin_engine::domain::estimation::shrinkage::Prior;
use pwin_engine::domain::estimation::state::StateKey;
use std::sync::Arc;

const SEQUENCE: [f64; 10] = [1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0];

fn query() -> AsOfQuery {
    let mut config = DomainConfig::sports_binary();
    config.state = StateConfig { k: 2, ahead: 1 };
    config.shrinkage.prior = Prior::Fixed { value: 0.5 };
    config.shrinkage.strength = 4.0;
    config.min_samples = 1;
    AsOfQuery::new(
        Arc::new(EstimationPipeline::new(&config).unwrap()),
        WarmupPolicy::rolling(1),
    )
}

#[test]
fn test_reference_sequence_counts() {
    let q = query();
    let history = series("REF", &SEQUENCE, 1);

    let after_10 = q.p_outcome(&history, day(9), &StateKey::new(vec![1, 0]), "1").unwrap();
    assert_eq!((after_10.samples, after_10.wins), (2, 1));
    assert_eq!(after_10.p_raw, Some(0.5));
    assert_eq!(after_10.probability, 0.5);

    let after_11 = q.p_outcome(&history, day(9), &StateKey::new(vec![1, 1]), "1").unwrap();
    assert_eq!((after_11.samples, after_11.wins), (3, 1));
    assert!((after_11.probability - 3.0 / 7.0).abs() < 1e-12);

    let down = q.p_outcome(&history, day(9), &StateKey::new(vec![1, 1]), "0").unwrap();
    assert_eq!(after_11.probability + down.probability, 1.0);
}

#[test]
fn test_reference_sequence_current_state() {
    let q = query();
    let history = series("REF", &SEQUENCE, 1);

    let current = q.p_current(&history, day(9), "1").unwrap();
    assert_eq!(current.state, StateKey::new(vec![1, 0]));
    assert_eq!(current.probability, 0.5);

    let snapshot = q.snapshot(&history, day(9)).unwrap();
    assert_eq!(snapshot.usable_samples(), 8);
    assert_eq!(snapshot.table().state_count(), 4);
}

#[test]
fn test_reference_sequence_earlier_as_of() {
    let q = query();
    let history = series("REF", &SEQUENCE, 1);

    // as of day 5 only [1,1,0,1,0,0] is visible: (1,0) -> 1 then 0
    let e = q.p_outcome(&history, day(5), &StateKey::new(vec![1, 0]), "1").unwrap();
    assert_eq!((e.samples, e.wins), (2, 1));
    let e = q.p_outcome(&history, day(5), &StateKey::new(vec![1, 1]), "1").unwrap();
    assert_eq!((e.samples, e.wins), (1, 0));
    assert!((e.probability - 2.0 / 5.0).abs() < 1e-12);
}
