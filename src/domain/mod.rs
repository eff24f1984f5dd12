// Observation series and calendar grids
pub mod series;

// Conditional outcome estimation (labels, states, counts, shrinkage)
pub mod estimation;

// Domain-specific error types
pub mod errors;
