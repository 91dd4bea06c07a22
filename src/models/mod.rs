pub mod anomaly;
pub mod minutes;
pub mod panel;
pub mod record;
pub mod risk;
