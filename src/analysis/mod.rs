pub mod anomaly;
pub mod evaluation;
pub mod ingest;
pub mod isolation_forest;
pub mod minutes;
pub mod panel;
pub mod random_forest;
pub mod risk;
