pub mod anomaly;
pub mod deviation;
pub mod minutes;
pub mod risk;
pub mod settings;
