use crate::error::Result;
use crate::models::minutes::{CheckMode, MinutesReport};

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn analyze_meeting_minutes(path: String, mode: Option<CheckMode>) -> Result<MinutesReport, String> {
    analyze_meeting_minutes_internal(&path, mode.unwrap_or(CheckMode::Keyword)).map_err(|e| e.to_string())
}

/// Minutes must be UTF-8; anything else surfaces as an IO error.
pub fn analyze_meeting_minutes_internal(path: &str, mode: CheckMode) -> Result<MinutesReport> {
    let text = std::fs::read_to_string(path)?;
    Ok(crate::analysis::minutes::check_minutes(&text, mode))
}
