use crate::analysis::isolation_forest::{quantile, IsolationForest, IsolationForestParams};
use crate::error::{AnalysisError, Result};
use crate::models::anomaly::{AnomalyAssessment, AnomalyLabel, AnomalyReport};
use crate::models::record::MemberCostPoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Normal, Poisson};

#[derive(Debug, Clone)]
pub struct AnomalyParams {
    pub contamination: f64,
    pub forest: IsolationForestParams,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            forest: IsolationForestParams::default(),
        }
    }
}

/// Fit an isolation forest on the (members, cost) batch and label the
/// `contamination` share of most isolated points as anomalies.
pub fn detect_anomalies(points: &[MemberCostPoint], params: &AnomalyParams) -> Result<AnomalyReport> {
    let start = std::time::Instant::now();

    if points.is_empty() {
        return Err(AnalysisError::EmptyBatch);
    }
    if !(params.contamination > 0.0 && params.contamination <= 0.5) {
        return Err(AnalysisError::InvalidSetting {
            key: "contamination".to_string(),
            reason: format!("must be in (0, 0.5], got {}", params.contamination),
        });
    }
    if let Some(row) = points
        .iter()
        .position(|p| !(p.members.is_finite() && p.cost.is_finite()))
    {
        return Err(AnalysisError::NonFiniteFeature { row });
    }
    // Split thresholds are drawn from [min, max), so every span must be finite.
    let columns: [(&str, fn(&MemberCostPoint) -> f64); 2] = [("members", |p| p.members), ("cost", |p| p.cost)];
    for (column, value) in columns {
        let (min, max) = points
            .iter()
            .map(value)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if !(max - min).is_finite() {
            return Err(AnalysisError::UnboundedFeatureRange {
                column: column.to_string(),
            });
        }
    }

    let features: Vec<Vec<f64>> = points.iter().map(|p| vec![p.members, p.cost]).collect();
    let forest = IsolationForest::fit(&features, &params.forest);
    let scores = forest.score_samples(&features);
    let threshold = quantile(&scores, 1.0 - params.contamination);

    let assessments: Vec<AnomalyAssessment> = points
        .iter()
        .zip(&scores)
        .map(|(point, &score)| AnomalyAssessment {
            id: point.id,
            members: point.members,
            cost: point.cost,
            anomaly_score: score,
            decision: threshold - score,
            label: if score > threshold {
                AnomalyLabel::Anomaly
            } else {
                AnomalyLabel::Normal
            },
        })
        .collect();

    let anomaly_count = assessments
        .iter()
        .filter(|a| a.label == AnomalyLabel::Anomaly)
        .count();

    log::info!(
        "Anomaly scan: {anomaly_count} of {} associations flagged (contamination {})",
        points.len(),
        params.contamination
    );

    Ok(AnomalyReport {
        threshold,
        contamination: params.contamination,
        anomaly_count,
        assessments,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Demo batch: ids `1..=n`, members ~ Poisson(50), cost ~ Normal(5000, 1000).
pub fn synthetic_membership(n: usize, seed: u64) -> Result<Vec<MemberCostPoint>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let member_distribution = Poisson::new(50.0).map_err(|e| AnalysisError::InvalidSetting {
        key: "member_distribution".to_string(),
        reason: e.to_string(),
    })?;
    let cost_distribution = Normal::new(5000.0, 1000.0).map_err(|e| AnalysisError::InvalidSetting {
        key: "cost_distribution".to_string(),
        reason: e.to_string(),
    })?;

    Ok((1..=n)
        .map(|id| MemberCostPoint {
            id: id as i64,
            members: rng.sample(&member_distribution),
            cost: rng.sample(&cost_distribution),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_about_the_contamination_share() {
        let points = synthetic_membership(100, 42).unwrap();
        let report = detect_anomalies(&points, &AnomalyParams::default()).unwrap();

        assert_eq!(report.assessments.len(), 100);
        // Expected 10; allow for ties around the threshold.
        assert!((7..=13).contains(&report.anomaly_count), "got {}", report.anomaly_count);
        assert_eq!(report.anomalies().count(), report.anomaly_count);
    }

    #[test]
    fn planted_outlier_is_labeled_anomalous() {
        let mut points = synthetic_membership(99, 7).unwrap();
        points.push(MemberCostPoint {
            id: 999,
            members: 400.0,
            cost: 60_000.0,
        });
        let report = detect_anomalies(&points, &AnomalyParams::default()).unwrap();

        let planted = report.assessments.iter().find(|a| a.id == 999).unwrap();
        assert_eq!(planted.label, AnomalyLabel::Anomaly);
        assert!(planted.decision < 0.0);
    }

    #[test]
    fn decision_sign_agrees_with_label() {
        let points = synthetic_membership(60, 3).unwrap();
        let report = detect_anomalies(&points, &AnomalyParams::default()).unwrap();
        for a in &report.assessments {
            assert_eq!(a.decision < 0.0, a.label == AnomalyLabel::Anomaly);
        }
    }

    #[test]
    fn rejects_empty_batches_and_bad_contamination() {
        assert!(matches!(
            detect_anomalies(&[], &AnomalyParams::default()),
            Err(AnalysisError::EmptyBatch)
        ));

        let params = AnomalyParams {
            contamination: 0.9,
            ..AnomalyParams::default()
        };
        let points = synthetic_membership(10, 1).unwrap();
        assert!(matches!(
            detect_anomalies(&points, &params),
            Err(AnalysisError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_features() {
        let points = vec![
            MemberCostPoint { id: 1, members: 10.0, cost: 100.0 },
            MemberCostPoint { id: 2, members: f64::NAN, cost: 100.0 },
        ];
        assert!(matches!(
            detect_anomalies(&points, &AnomalyParams::default()),
            Err(AnalysisError::NonFiniteFeature { row: 1 })
        ));
    }

    #[test]
    fn rejects_ranges_wider_than_f64() {
        let points = vec![
            MemberCostPoint { id: 1, members: 10.0, cost: -1e308 },
            MemberCostPoint { id: 2, members: 12.0, cost: 1e308 },
            MemberCostPoint { id: 3, members: 11.0, cost: 5000.0 },
        ];
        assert!(matches!(
            detect_anomalies(&points, &AnomalyParams::default()),
            Err(AnalysisError::UnboundedFeatureRange { ref column }) if column == "cost"
        ));
    }

    #[test]
    fn synthetic_members_are_whole_counts() {
        let points = synthetic_membership(200, 9).unwrap();
        assert!(points.iter().all(|p| p.members >= 0.0 && p.members.fract() == 0.0));
    }

    #[test]
    fn synthetic_batch_is_reproducible_and_plausible() {
        let a = synthetic_membership(100, 42).unwrap();
        let b = synthetic_membership(100, 42).unwrap();
        assert_eq!(a, b);

        let mean_members = a.iter().map(|p| p.members).sum::<f64>() / 100.0;
        let mean_cost = a.iter().map(|p| p.cost).sum::<f64>() / 100.0;
        assert!((40.0..60.0).contains(&mean_members));
        assert!((4500.0..5500.0).contains(&mean_cost));
    }
}
