use crate::domain::errors::SeriesError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A single timestamped numeric observation (close price, macro actual, match result)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Time-ordered observations of one entity (ticker, team, macro event).
///
/// Timestamps are strictly increasing. Values are not checked here; non-finite
/// values are rejected when the series is classified.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries {
    entity: String,
    points: Vec<Observation>,
}

impl ObservationSeries {
    /// Strict constructor: the caller guarantees sorted, duplicate-free input.
    pub fn new(entity: impl Into<String>, points: Vec<Observation>) -> Result<Self, SeriesError> {
        let entity = entity.into();
        for pair in points.windows(2) {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(SeriesError::DuplicateTimestamp {
                    entity,
                    timestamp: pair[1].timestamp,
                });
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::Unordered {
                    entity,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { entity, points })
    }

    /// Lenient constructor for loader output: sorts by timestamp and resolves
    /// duplicate timestamps last-write-wins (input order decides "last").
    pub fn from_unordered(entity: impl Into<String>, points: Vec<Observation>) -> Self {
        let entity = entity.into();
        let total = points.len();

        // stable sort keeps input order among equal timestamps
        let mut points = points;
        points.sort_by_key(|p| p.timestamp);

        let mut deduped: Vec<Observation> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }

        let replaced = total - deduped.len();
        if replaced > 0 {
            debug!(
                "ObservationSeries {}: {} duplicate timestamps resolved last-write-wins",
                entity, replaced
            );
        }

        Self {
            entity,
            points: deduped,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn observations(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// All observations with `timestamp <= as_of`.
    pub fn as_of(&self, as_of: DateTime<Utc>) -> &[Observation] {
        let end = self.points.partition_point(|p| p.timestamp <= as_of);
        &self.points[..end]
    }

    /// Owned copy of the series cut at `as_of` (inclusive).
    pub fn truncated(&self, as_of: DateTime<Utc>) -> ObservationSeries {
        ObservationSeries {
            entity: self.entity.clone(),
            points: self.as_of(as_of).to_vec(),
        }
    }
}

/// Read-only store of series shared across worker threads.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    series: HashMap<String, Arc<ObservationSeries>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the series for its entity.
    pub fn insert(&mut self, series: ObservationSeries) {
        self.series
            .insert(series.entity().to_string(), Arc::new(series));
    }

    pub fn get(&self, entity: &str) -> Option<Arc<ObservationSeries>> {
        self.series.get(entity).cloned()
    }

    /// Entity names in lexicographic order
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Series in entity order
    pub fn iter(&self) -> impl Iterator<Item = Arc<ObservationSeries>> + '_ {
        self.entities()
            .into_iter()
            .filter_map(move |name| self.series.get(&name).cloned())
    }
}

impl FromIterator<ObservationSeries> for ObservationStore {
    fn from_iter<T: IntoIterator<Item = ObservationSeries>>(iter: T) -> Self {
        let mut store = ObservationStore::new();
        for series in iter {
            store.insert(series);
        }
        store
    }
}
