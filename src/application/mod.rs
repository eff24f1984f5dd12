// Per-entity estimation: window -> labels -> states -> counts -> shrunk table
pub mod pipeline;
pub mod rolling;
pub mod snapshot;

// Point-in-time queries
pub mod query;

// Parallel fan-out over entities
pub mod batch;
pub mod trend_matrix;

// Decision threshold search
pub mod threshold;
