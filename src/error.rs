use thiserror::Error;

/// Every failure the analysis pipelines can surface to the dashboard.
///
/// The display strings start with a stable upper-case code so the UI shell
/// can branch on the prefix after the error crosses the IPC boundary.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("MISSING_COLUMN: required column `{0}` not found in header")]
    MissingColumn(String),

    #[error("MALFORMED_VALUE: row {row}, column `{column}`: cannot parse `{value}`")]
    MalformedValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("CSV_ERROR: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("INSUFFICIENT_RECORDS: training needs at least 2 labeled records, got {found}")]
    InsufficientRecords { found: usize },

    #[error("SINGLE_CLASS: every record has flagged = {class}; a classifier needs both flagged and unflagged history")]
    SingleClass { class: u8 },

    #[error("MISSING_LABEL: row {row} has no `flagged` value; training requires a label on every record")]
    MissingLabel { row: usize },

    #[error("EMPTY_BATCH: anomaly detection needs at least one record")]
    EmptyBatch,

    #[error("NON_FINITE_FEATURE: row {row} has a non-finite feature value")]
    NonFiniteFeature { row: usize },

    #[error("UNBOUNDED_FEATURE_RANGE: `{column}` spans a range too wide to partition")]
    UnboundedFeatureRange { column: String },

    #[error("INVALID_SETTING: `{key}` {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("UNKNOWN_METRIC: `{0}` is not a change metric column")]
    UnknownMetric(String),

    #[error("SETTINGS_ERROR: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_carry_code_prefix() {
        let err = AnalysisError::MissingColumn("year".to_string());
        assert!(err.to_string().starts_with("MISSING_COLUMN:"));

        let err = AnalysisError::SingleClass { class: 0 };
        assert!(err.to_string().starts_with("SINGLE_CLASS:"));

        let err = AnalysisError::InsufficientRecords { found: 1 };
        assert!(err.to_string().contains("got 1"));
    }
}
