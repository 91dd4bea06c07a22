use crate::error::Result;
use crate::models::anomaly::AnomalyReport;
use serde_json::Value;

/// Size of the generated demo batch when the caller does not choose one.
pub const DEMO_BATCH_SIZE: usize = 100;

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn detect_anomalies(csv_path: String, overrides: Option<Value>) -> Result<AnomalyReport, String> {
    tokio::task::spawn_blocking(move || detect_anomalies_internal(&csv_path, &overrides.unwrap_or(Value::Null)))
        .await
        .map_err(|e| format!("WORKER_FAILED: {e}"))?
        .map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn run_demo_anomaly_scan(size: Option<usize>, overrides: Option<Value>) -> Result<AnomalyReport, String> {
    tokio::task::spawn_blocking(move || run_demo_anomaly_scan_internal(size, &overrides.unwrap_or(Value::Null)))
        .await
        .map_err(|e| format!("WORKER_FAILED: {e}"))?
        .map_err(|e| e.to_string())
}

/// Score an uploaded `id, members, cost` table.
pub fn detect_anomalies_internal(csv_path: &str, overrides: &Value) -> Result<AnomalyReport> {
    let settings = crate::commands::settings::load_effective_settings(overrides)?;
    let points = crate::analysis::ingest::load_membership(csv_path)?;
    crate::analysis::anomaly::detect_anomalies(&points, &settings.anomaly_params())
}

/// Score a seeded synthetic batch; the generator shares the detector's seed.
pub fn run_demo_anomaly_scan_internal(size: Option<usize>, overrides: &Value) -> Result<AnomalyReport> {
    let settings = crate::commands::settings::load_effective_settings(overrides)?;
    let points = crate::analysis::anomaly::synthetic_membership(size.unwrap_or(DEMO_BATCH_SIZE), settings.anomaly_seed)?;
    crate::analysis::anomaly::detect_anomalies(&points, &settings.anomaly_params())
}
