use crate::domain::series::observation::Observation;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar grid onto which a raw daily series can be resampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl CalendarPeriod {
    /// Identifies the calendar period containing the timestamp.
    ///
    /// Weekly periods are ISO weeks (keyed by ISO year, so the last days of
    /// December can belong to week 1 of the next year).
    pub fn period_key(&self, timestamp: DateTime<Utc>) -> (i32, u32) {
        let date = timestamp.date_naive();
        match self {
            CalendarPeriod::Daily => (date.year(), date.ordinal()),
            CalendarPeriod::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            CalendarPeriod::Monthly => (date.year(), date.month()),
        }
    }

    /// Keeps the last observation of every calendar period.
    ///
    /// Input must be time-ordered. A period still in progress at the end of
    /// the input is represented by its latest observation.
    pub fn resample_last(&self, points: &[Observation]) -> Vec<Observation> {
        let mut out: Vec<Observation> = Vec::new();
        let mut current_key: Option<(i32, u32)> = None;

        for point in points {
            let key = self.period_key(point.timestamp);
            if current_key == Some(key) {
                if let Some(last) = out.last_mut() {
                    *last = *point;
                }
            } else {
                out.push(*point);
                current_key = Some(key);
            }
        }

        out
    }

    /// Timestamps of the last observation of each period, restricted to
    /// `[start, end]`. Used as the as-of grid for point-in-time snapshots.
    pub fn period_ends(
        &self,
        points: &[Observation],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        self.resample_last(points)
            .into_iter()
            .map(|p| p.timestamp)
            .filter(|ts| *ts >= start && *ts <= end)
            .collect()
    }

    /// Default raw-bar warm-up when this period is computed on rolling bars
    pub fn default_warmup_bars(&self) -> usize {
        match self {
            CalendarPeriod::Daily => 756,
            CalendarPeriod::Weekly => 756,
            CalendarPeriod::Monthly => 1260,
        }
    }

    /// Trading-bar horizon equivalent of this period
    pub fn trading_bars(&self) -> usize {
        match self {
            CalendarPeriod::Daily => 1,
            CalendarPeriod::Weekly => 5,
            CalendarPeriod::Monthly => 21,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarPeriod::Daily => "daily",
            CalendarPeriod::Weekly => "weekly",
            CalendarPeriod::Monthly => "monthly",
        }
    }

    pub fn all() -> Vec<CalendarPeriod> {
        vec![
            CalendarPeriod::Daily,
            CalendarPeriod::Weekly,
            CalendarPeriod::Monthly,
        ]
    }
}

impl FromStr for CalendarPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "d" | "1d" | "day" | "daily" => Ok(CalendarPeriod::Daily),
            "w" | "1w" | "week" | "weekly" => Ok(CalendarPeriod::Weekly),
            "m" | "1mo" | "month" | "monthly" => Ok(CalendarPeriod::Monthly),
            _ => Err(anyhow!(
                "Invalid calendar period: '{}'. Valid options: daily, weekly, monthly",
                s
            )),
        }
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
