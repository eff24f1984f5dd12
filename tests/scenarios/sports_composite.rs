use pwin_engine::application::pipeline::EstimationPipeline;
use pwin_engine::config::DomainConfig;
use pwin_engine::domain::errors::EstimationError;
use pwin_engine::domain::estimation::alphabet::Label;
use pwin_engine::domain::estimation::state::{StateKey, relative_form};

const LOOKBACK: usize = 5;
const MIN_WINS: usize = 3;

struct Season {
    home: Vec<bool>,
    wins: Vec<bool>,
    /// Results of the opponent faced in each fixture, up to that fixture
    opponent_wins: Vec<bool>,
}

/// Home side always wins; away side wins every sixth fixture. Opponents
/// alternate five-game winning and losing runs.
fn season(n: usize) -> Season {
    let home: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
    let wins = (0..n).map(|i| home[i] || i % 3 == 0).collect();
    let opponent_wins = (0..n).map(|i| (i / 5) % 2 == 0).collect();
    Season {
        home,
        wins,
        opponent_wins,
    }
}

impl Season {
    /// State of match `i`: relative form over the results before it, then the venue
    fn state_before(&self, i: usize) -> Option<StateKey> {
        StateKey::compose(&[
            relative_form(&self.wins[..i], &self.opponent_wins[..i], LOOKBACK, MIN_WINS),
            Some(StateKey::new(vec![i32::from(self.home[i])])),
        ])
    }

    fn pairs(&self) -> Vec<(StateKey, Label)> {
        (0..self.wins.len())
            .filter_map(|i| self.state_before(i).map(|s| (s, Label(u8::from(self.wins[i])))))
            .collect()
    }
}

#[test]
fn test_form_is_undefined_before_lookback() {
    let s = season(10);
    assert_eq!(s.state_before(LOOKBACK - 1), None);
    assert!(s.state_before(LOOKBACK).is_some());
    assert_eq!(s.pairs().len(), 10 - LOOKBACK);
}

#[test]
fn test_composite_table_separates_venues() {
    let s = season(80);
    let pipeline = EstimationPipeline::new(&DomainConfig::sports_binary()).unwrap();
    let table = pipeline.table_from_pairs(&s.pairs()).unwrap();
    assert_eq!(table.total_samples(), 75);

    let mut relative: Vec<i32> = table.states().map(|state| state.parts()[0]).collect();
    relative.dedup();
    assert_eq!(relative, vec![0, 1]);

    let mut away = (0usize, 0usize);
    for state in table.states() {
        assert_eq!(state.len(), 2);
        let cell = table.lookup(state, Label(1));
        if state.parts()[1] == 1 {
            assert_eq!(cell.p_raw, Some(1.0));
            assert!(cell.p_shrunk > 0.5 && cell.p_shrunk < 1.0);
        } else {
            away.0 += cell.wins;
            away.1 += cell.samples;
        }
    }
    assert!(away.1 > 0);
    assert!((away.0 as f64) / (away.1 as f64) < 0.5);

    // next fixture (index 80) is at home against an opponent on a losing run
    let next = season(81).state_before(80).unwrap();
    assert_eq!(next, StateKey::new(vec![1, 1]));
    assert!(table.lookup(&next, Label(1)).p_shrunk > 0.5);
}

#[test]
fn test_short_season_is_refused() {
    let s = season(20);
    let pipeline = EstimationPipeline::new(&DomainConfig::sports_binary()).unwrap();
    assert!(matches!(
        pipeline.table_from_pairs(&s.pairs()),
        Err(EstimationError::InsufficientHistory { usable: 15, floor: 30 })
    ));
}
