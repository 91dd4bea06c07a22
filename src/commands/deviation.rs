use crate::error::{AnalysisError, Result};
use crate::models::panel::{ChangeMetric, PanelAnalysis, PanelRow, YearlyChangeRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationView {
    pub metric: ChangeMetric,
    pub threshold: f64,
    pub rows: Vec<PanelRow>,
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn analyze_deviations(csv_path: String) -> Result<PanelAnalysis, String> {
    analyze_deviations_internal(&csv_path).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn filter_deviations(
    csv_path: String,
    metric: Option<String>,
    threshold: Option<f64>,
) -> Result<DeviationView, String> {
    filter_deviations_internal(&csv_path, metric.as_deref(), threshold, &Value::Null).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn export_deviations(csv_path: String, output_path: String) -> Result<usize, String> {
    export_deviations_internal(&csv_path, &output_path).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn compute_yearly_changes(csv_path: String) -> Result<Vec<YearlyChangeRow>, String> {
    compute_yearly_changes_internal(&csv_path).map_err(|e| e.to_string())
}

/// Upload, derive ratios and year-over-year changes, summarize.
pub fn analyze_deviations_internal(csv_path: &str) -> Result<PanelAnalysis> {
    let start = std::time::Instant::now();
    let records = crate::analysis::ingest::load_records(csv_path)?;
    let rows = crate::analysis::panel::calculate_relation_changes(&records);
    let summary = crate::analysis::panel::summarize(&rows);

    log::info!(
        "Deviation analysis: {} rows across {} associations",
        summary.row_count,
        summary.association_count
    );

    Ok(PanelAnalysis {
        summary,
        rows,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Rows above the threshold for one change metric. Missing arguments fall
/// back to the resolved settings.
pub fn filter_deviations_internal(
    csv_path: &str,
    metric: Option<&str>,
    threshold: Option<f64>,
    overrides: &Value,
) -> Result<DeviationView> {
    let settings = crate::commands::settings::load_effective_settings(overrides)?;
    let metric = match metric {
        Some(column) => {
            ChangeMetric::from_column(column).ok_or_else(|| AnalysisError::UnknownMetric(column.to_string()))?
        }
        None => settings.deviation_metric,
    };
    let threshold = threshold.unwrap_or(settings.deviation_threshold);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(AnalysisError::InvalidSetting {
            key: "threshold".to_string(),
            reason: format!("must be between 0 and 100, got {threshold}"),
        });
    }

    let records = crate::analysis::ingest::load_records(csv_path)?;
    let rows = crate::analysis::panel::calculate_relation_changes(&records);
    let rows = crate::analysis::panel::filter_deviations(&rows, metric, threshold);

    if rows.is_empty() {
        log::info!("No deviations above {threshold}% for {}", metric.column());
    }

    Ok(DeviationView {
        metric,
        threshold,
        rows,
    })
}

/// Write the derived table next to the upload; returns the number of data rows.
pub fn export_deviations_internal(csv_path: &str, output_path: &str) -> Result<usize> {
    let records = crate::analysis::ingest::load_records(csv_path)?;
    let rows = crate::analysis::panel::calculate_relation_changes(&records);
    let file = std::fs::File::create(output_path)?;
    crate::analysis::panel::write_panel_csv(&rows, file)?;
    Ok(rows.len())
}

pub fn compute_yearly_changes_internal(csv_path: &str) -> Result<Vec<YearlyChangeRow>> {
    let records = crate::analysis::ingest::load_records(csv_path)?;
    Ok(crate::analysis::panel::calculate_yearly_changes(&records))
}
