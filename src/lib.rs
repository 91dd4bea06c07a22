pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

pub use analysis::risk::{RiskModel, TrainingOutcome};
pub use error::{AnalysisError, Result};

#[cfg(feature = "desktop")]
use commands::{
    anomaly::{detect_anomalies, run_demo_anomaly_scan},
    deviation::{analyze_deviations, compute_yearly_changes, export_deviations, filter_deviations},
    minutes::analyze_meeting_minutes,
    risk::{predict_risks, train_risk_model},
    settings::{get_settings, resolve_settings},
};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            analyze_deviations,
            filter_deviations,
            export_deviations,
            compute_yearly_changes,
            detect_anomalies,
            run_demo_anomaly_scan,
            train_risk_model,
            predict_risks,
            analyze_meeting_minutes,
            get_settings,
            resolve_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
