//! End-to-end scenarios, one module per domain
mod batch_from_csv;
mod calendar_backtest;
mod common;
mod macro_decisions;
mod reference_sequence;
mod sports_composite;
