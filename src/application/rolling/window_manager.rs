use crate::domain::series::calendar::CalendarPeriod;
use crate::domain::series::observation::{Observation, ObservationSeries};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

fn default_ceiling_bars() -> usize {
    756
}

fn default_floor_bars() -> usize {
    504
}

fn default_ceiling_years() -> u32 {
    5
}

fn default_floor_years() -> u32 {
    3
}

/// Which slice of history feeds one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarmupPolicy {
    /// Raw bars, labels from the `horizon`-bar change. Trailing `ceiling_bars`
    /// are used; `floor_bars` is the shorter window still considered acceptable.
    Rolling {
        horizon: usize,
        #[serde(default = "default_ceiling_bars")]
        ceiling_bars: usize,
        #[serde(default = "default_floor_bars")]
        floor_bars: usize,
    },
    /// Bars resampled onto a calendar grid, labels between consecutive periods.
    CalendarFixed {
        period: CalendarPeriod,
        #[serde(default = "default_ceiling_years")]
        ceiling_years: u32,
        #[serde(default = "default_floor_years")]
        floor_years: u32,
    },
}

impl WarmupPolicy {
    /// Rolling policy with the default 3y/2y bar windows
    pub fn rolling(horizon: usize) -> Self {
        WarmupPolicy::Rolling {
            horizon,
            ceiling_bars: default_ceiling_bars(),
            floor_bars: default_floor_bars(),
        }
    }

    /// Rolling policy with the raw-bar warm-up used for a calendar-equivalent horizon
    pub fn rolling_for(period: CalendarPeriod) -> Self {
        let ceiling_bars = period.default_warmup_bars();
        WarmupPolicy::Rolling {
            horizon: period.trading_bars(),
            ceiling_bars,
            floor_bars: ceiling_bars * 2 / 3,
        }
    }

    pub fn calendar(period: CalendarPeriod) -> Self {
        WarmupPolicy::CalendarFixed {
            period,
            ceiling_years: default_ceiling_years(),
            floor_years: default_floor_years(),
        }
    }

    /// Bar distance used by the signal transform
    pub fn signal_horizon(&self) -> usize {
        match self {
            WarmupPolicy::Rolling { horizon, .. } => *horizon,
            WarmupPolicy::CalendarFixed { .. } => 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            WarmupPolicy::Rolling {
                horizon,
                ceiling_bars,
                floor_bars,
            } => {
                if *horizon == 0 {
                    return Err("rolling horizon must be >= 1".to_string());
                }
                if *floor_bars == 0 || floor_bars > ceiling_bars {
                    return Err(format!(
                        "need 0 < floor_bars <= ceiling_bars, got {} / {}",
                        floor_bars, ceiling_bars
                    ));
                }
            }
            WarmupPolicy::CalendarFixed {
                ceiling_years,
                floor_years,
                ..
            } => {
                if *floor_years == 0 || floor_years > ceiling_years {
                    return Err(format!(
                        "need 0 < floor_years <= ceiling_years, got {} / {}",
                        floor_years, ceiling_years
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for WarmupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarmupPolicy::Rolling {
                horizon,
                ceiling_bars,
                ..
            } => write!(f, "rolling(h={}, {} bars)", horizon, ceiling_bars),
            WarmupPolicy::CalendarFixed {
                period,
                ceiling_years,
                ..
            } => write!(f, "{}({}y)", period, ceiling_years),
        }
    }
}

/// How much of the preferred warm-up the history could supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowQuality {
    /// The whole ceiling window was available
    Full,
    /// Shorter than the ceiling but at least the floor
    Fallback,
    /// Below the floor; only the minimum-sample check stands between this and a refusal
    Partial,
}

impl WindowQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowQuality::Full => "full",
            WindowQuality::Fallback => "fallback",
            WindowQuality::Partial => "partial",
        }
    }
}

/// Observations selected for one as-of date, all dated `<= as_of`
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupWindow {
    pub as_of: DateTime<Utc>,
    pub points: Vec<Observation>,
    pub quality: WindowQuality,
}

impl WarmupWindow {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_observation(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }
}

fn years_before(as_of: DateTime<Utc>, years: u32) -> DateTime<Utc> {
    as_of
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Selects the warm-up slice of `history` for `as_of`.
///
/// The history is truncated at `as_of` before anything else, so nothing dated
/// later can reach the window. Calendar policies resample after truncation; a
/// period still open at `as_of` is represented by its latest visible bar.
pub fn select_window(
    history: &ObservationSeries,
    as_of: DateTime<Utc>,
    policy: &WarmupPolicy,
) -> WarmupWindow {
    let visible = history.as_of(as_of);

    let (points, quality) = match policy {
        WarmupPolicy::Rolling {
            ceiling_bars,
            floor_bars,
            ..
        } => {
            let start = visible.len().saturating_sub(*ceiling_bars);
            let quality = if visible.len() >= *ceiling_bars {
                WindowQuality::Full
            } else if visible.len() >= *floor_bars {
                WindowQuality::Fallback
            } else {
                WindowQuality::Partial
            };
            (visible[start..].to_vec(), quality)
        }
        WarmupPolicy::CalendarFixed {
            period,
            ceiling_years,
            floor_years,
        } => {
            let ceiling_start = years_before(as_of, *ceiling_years);
            let floor_start = years_before(as_of, *floor_years);
            let quality = match visible.first() {
                Some(first) if first.timestamp <= ceiling_start => WindowQuality::Full,
                Some(first) if first.timestamp <= floor_start => WindowQuality::Fallback,
                _ => WindowQuality::Partial,
            };
            let start = visible.partition_point(|p| p.timestamp <= ceiling_start);
            (period.resample_last(&visible[start..]), quality)
        }
    };

    debug!(
        "WindowManager: {} as of {} -> {} points ({}) under {}",
        history.entity(),
        as_of.format("%Y-%m-%d"),
        points.len(),
        quality.as_str(),
        policy
    );

    WarmupWindow {
        as_of,
        points,
        quality,
    }
}
