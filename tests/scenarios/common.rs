use chrono::{DateTime, Duration, TimeZone, Utc};
use pwin_engine::domain::series::observation::{Observation, ObservationSeries};

pub fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset)
}

/// One observation per `step` days starting at day 0
pub fn series(entity: &str, values: &[f64], step: i64) -> ObservationSeries {
    let points = values
        .iter()
        .enumerate()
        .map(|(i, v)| Observation::new(day(i as i64 * step), *v))
        .collect();
    ObservationSeries::new(entity, points).unwrap()
}
