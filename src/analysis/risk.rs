use crate::analysis::evaluation::classification_report;
use crate::analysis::random_forest::{RandomForest, RandomForestParams};
use crate::error::{AnalysisError, Result};
use crate::models::record::AssociationYearRecord;
use crate::models::risk::{EvaluationReport, FeatureImportance, RiskLevel, ScoredRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const RISK_FEATURES: [&str; 3] = ["activities", "total_members", "approved_grants"];

#[derive(Debug, Clone)]
pub struct RiskParams {
    pub n_estimators: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// A trained classifier. Returned by [`train_risk_model`] and handed back
/// explicitly to [`predict_risks`]; nothing keeps it between calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    forest: RandomForest,
    pub features: Vec<String>,
    pub seed: u64,
}

impl RiskModel {
    /// Probability that the record belongs to the flagged class.
    pub fn predict_proba(&self, record: &AssociationYearRecord) -> f64 {
        self.forest.predict_proba(&record.risk_features())[1]
    }

    pub fn predict(&self, record: &AssociationYearRecord) -> u8 {
        self.forest.predict(&record.risk_features())
    }

    pub fn feature_importances(&self) -> Vec<FeatureImportance> {
        self.features
            .iter()
            .zip(self.forest.feature_importances())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub model: RiskModel,
    pub report: EvaluationReport,
    /// `report` as the fixed-width text table shown in the dashboard.
    pub report_text: String,
    pub feature_importances: Vec<FeatureImportance>,
    pub trained_at: i64,
    pub duration_ms: u64,
}

/// Seeded shuffle split. The first `ceil(test_fraction * n)` permuted indices
/// form the test set; both sides keep at least one row when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_test = ((test_fraction * n as f64).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
    let train = permutation.split_off(n_test);
    (train, permutation)
}

/// Train on labeled history, evaluate on a held-out split.
pub fn train_risk_model(records: &[AssociationYearRecord], params: &RiskParams) -> Result<TrainingOutcome> {
    let start = std::time::Instant::now();

    if records.len() < 2 {
        return Err(AnalysisError::InsufficientRecords {
            found: records.len(),
        });
    }

    let labels = records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            record
                .flagged
                .map(u8::from)
                .ok_or(AnalysisError::MissingLabel { row })
        })
        .collect::<Result<Vec<u8>>>()?;

    if let Some(&class) = labels.first() {
        if labels.iter().all(|&label| label == class) {
            return Err(AnalysisError::SingleClass { class });
        }
    }

    let features: Vec<Vec<f64>> = records.iter().map(|r| r.risk_features().to_vec()).collect();
    let (train_idx, test_idx) = train_test_split(records.len(), params.test_fraction, params.seed);

    let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| features[i].clone()).collect();
    let train_y: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
    if train_y.iter().all(|&y| y == train_y[0]) {
        log::warn!("Training split holds a single class; the model will predict it everywhere");
    }

    let forest = RandomForest::fit(
        &train_x,
        &train_y,
        &RandomForestParams {
            n_estimators: params.n_estimators,
            seed: params.seed,
        },
    );
    let model = RiskModel {
        forest,
        features: RISK_FEATURES.iter().map(|f| f.to_string()).collect(),
        seed: params.seed,
    };

    let test_y: Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();
    let test_pred: Vec<u8> = test_idx.iter().map(|&i| model.predict(&records[i])).collect();
    let report = classification_report(&test_y, &test_pred, train_idx.len());

    log::info!(
        "Trained risk model on {} records, evaluated on {} (accuracy {:.2})",
        train_idx.len(),
        test_idx.len(),
        report.accuracy
    );

    Ok(TrainingOutcome {
        feature_importances: model.feature_importances(),
        report_text: report.to_string(),
        model,
        report,
        trained_at: chrono::Utc::now().timestamp(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Attach `Risk Prediction` and `Risk Level` to each record. The model is
/// only read.
pub fn predict_risks(model: &RiskModel, records: &[AssociationYearRecord]) -> Vec<ScoredRecord> {
    records
        .iter()
        .map(|record| {
            let prediction = model.predict(record);
            ScoredRecord {
                record: record.clone(),
                risk_prediction: prediction,
                risk_level: RiskLevel::from_prediction(prediction),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Associations with many grants per member are flagged.
    fn history(n: i64) -> Vec<AssociationYearRecord> {
        (0..n)
            .map(|i| {
                let members = 20 + (i * 7) % 80;
                let flagged = i % 3 == 0;
                let grants = if flagged { members * 40 } else { members * 2 + i % 5 };
                AssociationYearRecord {
                    id: i,
                    year: 2020 + (i % 4) as i32,
                    activities: 5 + (i * 11) % 30,
                    total_members: members,
                    approved_grants: grants,
                    flagged: Some(flagged),
                }
            })
            .collect()
    }

    #[test]
    fn split_is_80_20_and_disjoint() {
        let (train, test) = train_test_split(50, 0.2, 42);
        assert_eq!(test.len(), 10);
        assert_eq!(train.len(), 40);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn split_keeps_one_row_each_side_for_tiny_inputs() {
        let (train, test) = train_test_split(2, 0.2, 42);
        assert_eq!((train.len(), test.len()), (1, 1));
    }

    #[test]
    fn training_reports_held_out_metrics() {
        let outcome = train_risk_model(&history(60), &RiskParams::default()).unwrap();

        assert_eq!(outcome.report.test_size, 12);
        assert_eq!(outcome.report.train_size, 48);
        assert!(outcome.report.accuracy >= 0.8, "accuracy {}", outcome.report.accuracy);
        assert_eq!(outcome.feature_importances.len(), 3);
    }

    #[test]
    fn identical_inputs_reproduce_identical_predictions() {
        let data = history(60);
        let a = train_risk_model(&data, &RiskParams::default()).unwrap();
        let b = train_risk_model(&data, &RiskParams::default()).unwrap();

        assert_eq!(a.model, b.model);
        assert_eq!(predict_risks(&a.model, &data), predict_risks(&b.model, &data));
    }

    #[test]
    fn rejects_degenerate_training_sets() {
        let data = history(1);
        assert!(matches!(
            train_risk_model(&data, &RiskParams::default()),
            Err(AnalysisError::InsufficientRecords { found: 1 })
        ));

        let mut data = history(10);
        data.iter_mut().for_each(|r| r.flagged = Some(false));
        assert!(matches!(
            train_risk_model(&data, &RiskParams::default()),
            Err(AnalysisError::SingleClass { class: 0 })
        ));

        let mut data = history(10);
        data[4].flagged = None;
        assert!(matches!(
            train_risk_model(&data, &RiskParams::default()),
            Err(AnalysisError::MissingLabel { row: 4 })
        ));
    }

    #[test]
    fn predictions_attach_prediction_and_level() {
        let outcome = train_risk_model(&history(60), &RiskParams::default()).unwrap();
        let new = vec![
            AssociationYearRecord {
                id: 900,
                year: 2024,
                activities: 10,
                total_members: 50,
                approved_grants: 2000,
                flagged: None,
            },
            AssociationYearRecord {
                id: 901,
                year: 2024,
                activities: 10,
                total_members: 50,
                approved_grants: 100,
                flagged: None,
            },
        ];
        let scored = predict_risks(&outcome.model, &new);

        assert_eq!(scored[0].risk_prediction, 1);
        assert_eq!(scored[0].risk_level, RiskLevel::High);
        assert_eq!(scored[1].risk_prediction, 0);
        assert_eq!(scored[1].risk_level, RiskLevel::Low);

        let json = serde_json::to_value(&scored[0]).unwrap();
        assert_eq!(json["Risk Prediction"], 1);
        assert_eq!(json["Risk Level"], "Hög");
        assert_eq!(json["id"], 900);
    }
}
