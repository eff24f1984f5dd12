// Observation series and calendar grids
pub mod calendar;
pub mod observation;
