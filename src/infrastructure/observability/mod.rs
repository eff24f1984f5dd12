//! Push-based observability for the engine
//!
//! Structured logs go to stdout (pretty or JSON); Prometheus metrics are kept
//! in an in-process registry and rendered on demand. Nothing listens for
//! incoming requests.

pub mod logging;
pub mod metrics;

pub use metrics::EngineMetrics;
