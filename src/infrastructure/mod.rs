pub mod csv_loader;
pub mod export;
pub mod observability;
