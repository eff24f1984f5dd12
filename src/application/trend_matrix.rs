use crate::application::batch::BatchRunner;
use crate::application::query::Estimate;
use crate::application::threshold::{ThresholdSettings, optimize_threshold};
use crate::config::HorizonConfig;
use crate::domain::errors::{ConfigError, EstimationError};
use crate::domain::series::observation::ObservationStore;
use chrono::{DateTime, Utc};

/// `p_up` of one entity on one horizon. Errors stay in the cell.
#[derive(Debug, Clone)]
pub struct TrendCell {
    pub horizon: String,
    pub result: Result<Estimate, EstimationError>,
}

impl TrendCell {
    pub fn p_up(&self) -> Option<f64> {
        self.result.as_ref().ok().map(|e| e.probability)
    }

    pub fn samples(&self) -> Option<usize> {
        self.result.as_ref().ok().map(|e| e.samples)
    }
}

#[derive(Debug, Clone)]
pub struct TrendRow {
    pub entity: String,
    pub cells: Vec<TrendCell>,
    pub threshold: Option<f64>,
}

impl TrendRow {
    pub fn cell(&self, horizon: &str) -> Option<&TrendCell> {
        self.cells.iter().find(|c| c.horizon == horizon)
    }
}

/// Current-regime `p_up` for every entity across several horizons
#[derive(Debug, Clone)]
pub struct TrendMatrix {
    pub as_of: DateTime<Utc>,
    pub horizons: Vec<String>,
    pub rows: Vec<TrendRow>,
}

impl TrendMatrix {
    /// Builds the matrix in parallel over entities.
    ///
    /// Needs a binary alphabet, since each cell is the favorable-class estimate.
    pub fn build(
        runner: &BatchRunner,
        store: &ObservationStore,
        as_of: DateTime<Utc>,
        horizons: &[HorizonConfig],
        threshold: Option<&ThresholdSettings>,
    ) -> Result<Self, ConfigError> {
        if !runner.pipeline().alphabet().is_binary() {
            return Err(ConfigError::invalid(
                "alphabet",
                "trend matrix needs a binary alphabet",
            ));
        }
        if horizons.is_empty() {
            return Err(ConfigError::invalid("horizons", "no horizons configured"));
        }

        let outcomes = runner.run_with(store, |pipeline, series| {
            let cells = horizons
                .iter()
                .map(|h| TrendCell {
                    horizon: h.name.clone(),
                    result: pipeline
                        .snapshot(series, as_of, &h.policy)
                        .and_then(|s| s.favorable_estimate()),
                })
                .collect();
            let threshold =
                threshold.map(|settings| optimize_threshold(pipeline, series.as_of(as_of), settings));

            Ok(TrendRow {
                entity: series.entity().to_string(),
                cells,
                threshold,
            })
        });

        let rows = outcomes
            .into_iter()
            .map(|outcome| match outcome.result {
                Ok(row) => row,
                Err(e) => TrendRow {
                    entity: outcome.entity,
                    cells: horizons
                        .iter()
                        .map(|h| TrendCell {
                            horizon: h.name.clone(),
                            result: Err(e.clone()),
                        })
                        .collect(),
                    threshold: None,
                },
            })
            .collect();

        Ok(Self {
            as_of,
            horizons: horizons.iter().map(|h| h.name.clone()).collect(),
            rows,
        })
    }

    pub fn row(&self, entity: &str) -> Option<&TrendRow> {
        self.rows.iter().find(|r| r.entity == entity)
    }
}
