use crate::models::risk::{AverageMetrics, ClassMetrics, EvaluationReport};
use std::fmt;

/// Precision, recall and F1 per class for binary labels, plus accuracy and
/// macro/weighted averages. Classes appear when present in either the truth
/// or the predictions; undefined ratios (zero division) count as 0.
pub fn classification_report(
    y_true: &[u8],
    y_pred: &[u8],
    train_size: usize,
) -> EvaluationReport {
    let mut classes = Vec::new();
    for class in [0u8, 1u8] {
        let in_truth = y_true.iter().any(|&y| y == class);
        let in_pred = y_pred.iter().any(|&y| y == class);
        if !(in_truth || in_pred) {
            continue;
        }
        classes.push(class_metrics(y_true, y_pred, class));
    }

    let total = y_true.len();
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, total);

    EvaluationReport {
        macro_avg: average(&classes, |_| 1.0),
        weighted_avg: average(&classes, |c| c.support as f64),
        classes,
        accuracy,
        train_size,
        test_size: total,
    }
}

fn class_metrics(y_true: &[u8], y_pred: &[u8], class: u8) -> ClassMetrics {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassMetrics {
        label: class.to_string(),
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

fn average<F: Fn(&ClassMetrics) -> f64>(classes: &[ClassMetrics], weight: F) -> AverageMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    let support = classes.iter().map(|c| c.support).sum();
    if total_weight == 0.0 {
        return AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support,
        };
    }
    let weighted = |metric: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|c| metric(c) * weight(c)).sum::<f64>() / total_weight
    };
    AverageMetrics {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
        support,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Fixed-width text table for the dashboard's report panel.
impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.label, class.precision, class.recall, class.f1, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>12} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.test_size)?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_class_metrics_match_hand_counts() {
        // class 1: tp=2, fp=1, fn=1 -> p=2/3, r=2/3
        let y_true = [1, 1, 1, 0, 0, 0];
        let y_pred = [1, 1, 0, 1, 0, 0];
        let report = classification_report(&y_true, &y_pred, 24);

        let flagged = &report.classes[1];
        assert_eq!(flagged.label, "1");
        assert!((flagged.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((flagged.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(flagged.support, 3);
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.test_size, 6);
        assert_eq!(report.train_size, 24);
    }

    #[test]
    fn zero_division_reports_zero() {
        let report = classification_report(&[1, 1], &[0, 0], 8);

        let flagged = report.classes.iter().find(|c| c.label == "1").unwrap();
        assert_eq!(flagged.recall, 0.0);
        let unflagged = report.classes.iter().find(|c| c.label == "0").unwrap();
        assert_eq!(unflagged.precision, 0.0);
        assert_eq!(unflagged.support, 0);
    }

    #[test]
    fn weighted_average_uses_support() {
        let report = classification_report(&[0, 0, 0, 1], &[0, 0, 0, 0], 10);
        assert!((report.weighted_avg.recall - 0.75).abs() < 1e-12);
        assert!((report.macro_avg.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn renders_text_table() {
        let report = classification_report(&[0, 1], &[0, 1], 8);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }
}
