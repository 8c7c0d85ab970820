pub mod analysis;
pub mod anomaly;
pub mod regime;
pub mod signal;
pub mod types;
