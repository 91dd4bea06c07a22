use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyLabel {
    Anomaly,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAssessment {
    pub id: i64,
    pub members: f64,
    pub cost: f64,
    /// Isolation score in (0, 1]; higher is more isolated.
    pub anomaly_score: f64,
    /// `threshold - anomaly_score`; negative means anomalous.
    pub decision: f64,
    pub label: AnomalyLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub threshold: f64,
    pub contamination: f64,
    pub anomaly_count: usize,
    pub assessments: Vec<AnomalyAssessment>,
    pub duration_ms: u64,
}

impl AnomalyReport {
    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyAssessment> {
        self.assessments
            .iter()
            .filter(|a| a.label == AnomalyLabel::Anomaly)
    }
}
