use crate::analysis::risk::{RiskModel, TrainingOutcome};
use crate::error::Result;
use crate::models::risk::ScoredRecord;
use serde_json::Value;

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn train_risk_model(csv_path: String, overrides: Option<Value>) -> Result<TrainingOutcome, String> {
    tokio::task::spawn_blocking(move || train_risk_model_internal(&csv_path, &overrides.unwrap_or(Value::Null)))
        .await
        .map_err(|e| format!("WORKER_FAILED: {e}"))?
        .map_err(|e| e.to_string())
}

/// The model travels with the request: the shell keeps what training
/// returned and sends it back here.
#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn predict_risks(model: RiskModel, csv_path: String) -> Result<Vec<ScoredRecord>, String> {
    tokio::task::spawn_blocking(move || predict_risks_internal(&model, &csv_path))
        .await
        .map_err(|e| format!("WORKER_FAILED: {e}"))?
        .map_err(|e| e.to_string())
}

pub fn train_risk_model_internal(csv_path: &str, overrides: &Value) -> Result<TrainingOutcome> {
    let settings = crate::commands::settings::load_effective_settings(overrides)?;
    let history = crate::analysis::ingest::load_records(csv_path)?;
    crate::analysis::risk::train_risk_model(&history, &settings.risk_params())
}

pub fn predict_risks_internal(model: &RiskModel, csv_path: &str) -> Result<Vec<ScoredRecord>> {
    let records = crate::analysis::ingest::load_records(csv_path)?;
    let scored = crate::analysis::risk::predict_risks(model, &records);
    let high = scored.iter().filter(|s| s.risk_prediction == 1).count();
    log::info!("Scored {} records, {high} at high risk", scored.len());
    Ok(scored)
}
