use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that abort the estimation of a single entity
#[derive(Debug, Clone, Error)]
pub enum EstimationError {
    #[error("Insufficient history: {usable} usable samples < floor {floor}")]
    InsufficientHistory { usable: usize, floor: usize },

    #[error("Undefined state: {available} prior labels < required {required}")]
    UndefinedState { available: usize, required: usize },

    #[error("Malformed observation at {timestamp}: value {value} ({reason})")]
    MalformedObservation {
        timestamp: DateTime<Utc>,
        value: f64,
        reason: String,
    },

    #[error("Unknown outcome class: {name}")]
    UnknownOutcome { name: String },
}

impl EstimationError {
    /// Short stable name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            EstimationError::InsufficientHistory { .. } => "insufficient_history",
            EstimationError::UndefinedState { .. } => "undefined_state",
            EstimationError::MalformedObservation { .. } => "malformed_observation",
            EstimationError::UnknownOutcome { .. } => "unknown_outcome",
        }
    }
}

/// Errors related to per-domain configuration
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised when constructing an observation series strictly
#[derive(Debug, Clone, Error)]
pub enum SeriesError {
    #[error("Series {entity}: timestamp {timestamp} is not after its predecessor")]
    Unordered {
        entity: String,
        timestamp: DateTime<Utc>,
    },

    #[error("Series {entity}: duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        entity: String,
        timestamp: DateTime<Utc>,
    },
}
