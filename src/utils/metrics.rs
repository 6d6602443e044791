//! Metrics Module for Model Evaluation
//!
//! Per-class precision, recall and F1 with macro and weighted averages, plus a
//! labeled confusion matrix that can be printed or saved as CSV.

use serde::{Deserialize, Serialize};

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class label (prefixed or canonical)
    pub label: String,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2 * (precision * recall) / (precision + recall)
    pub f1: f64,

    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize, label: &str) -> Self {
        let true_positives = cm.get(class_idx, class_idx);
        let predicted = cm.col_sums()[class_idx];
        let support = cm.row_sums()[class_idx];

        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            label: label.to_string(),
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Classification report over a labeled confusion matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub weighted_precision: f64,
    pub weighted_recall: f64,
    pub weighted_f1: f64,
    pub total_samples: usize,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationReport {
    /// Build a report from predictions and ground truth
    ///
    /// Indices outside `labels` are ignored by the confusion matrix.
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], labels: &[String]) -> Self {
        let num_classes = labels.len();
        let confusion_matrix = ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let per_class: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| ClassMetrics::from_confusion_matrix(&confusion_matrix, idx, label))
            .collect();

        let n = num_classes.max(1) as f64;
        let total_support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total_support == 0 {
                0.0
            } else {
                per_class.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total_support as f64
            }
        };

        Self {
            accuracy: confusion_matrix.accuracy(),
            macro_precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
            macro_recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
            macro_f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n,
            weighted_precision: weighted(|m| m.precision),
            weighted_recall: weighted(|m| m.recall),
            weighted_f1: weighted(|m| m.f1),
            total_samples: confusion_matrix.total(),
            per_class,
            confusion_matrix,
        }
    }

    /// Render the report as a text table
    pub fn display(&self) -> String {
        let width = self
            .per_class
            .iter()
            .map(|m| m.label.len())
            .max()
            .unwrap_or(0)
            .max(12);

        let mut output = String::new();
        output.push_str(&format!(
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        for m in &self.per_class {
            output.push_str(&format!(
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                m.label, m.precision, m.recall, m.f1, m.support
            ));
        }
        output.push('\n');
        output.push_str(&format!(
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy", "", "", self.accuracy, self.total_samples
        ));
        output.push_str(&format!(
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, self.total_samples
        ));
        output.push_str(&format!(
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            "weighted avg",
            self.weighted_precision,
            self.weighted_recall,
            self.weighted_f1,
            self.total_samples
        ));
        output
    }
}

impl std::fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Row-major counts (row = actual, column = predicted)
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Actual class counts
    pub fn row_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|row| (0..self.num_classes).map(|col| self.get(row, col)).sum())
            .collect()
    }

    /// Predicted class counts
    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|col| (0..self.num_classes).map(|row| self.get(row, col)).sum())
            .collect()
    }

    /// Pretty print the matrix with row and column labels
    pub fn display(&self, labels: &[String]) -> String {
        let name = |idx: usize| labels.get(idx).cloned().unwrap_or_else(|| idx.to_string());
        let width = (0..self.num_classes)
            .map(|i| name(i).len())
            .max()
            .unwrap_or(0)
            .max(6);

        let mut output = String::from("Confusion Matrix (rows=actual, cols=predicted):\n\n");
        output.push_str(&format!("{:>width$}", ""));
        for col in 0..self.num_classes {
            output.push_str(&format!(" {:>6}", col));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            output.push_str(&format!("{:>width$}", name(row)));
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!(" [{:>4}]", count));
                } else {
                    output.push_str(&format!(" {:>6}", count));
                }
            }
            output.push_str(&format!("   ({})\n", row));
        }
        output
    }

    /// Save confusion matrix to CSV with label headers
    pub fn save_csv(&self, path: &std::path::Path, labels: &[String]) -> std::io::Result<()> {
        let name = |idx: usize| labels.get(idx).cloned().unwrap_or_else(|| idx.to_string());
        let mut content = String::from("actual\\predicted");
        for col in 0..self.num_classes {
            content.push(',');
            content.push_str(&name(col));
        }
        content.push('\n');

        for row in 0..self.num_classes {
            content.push_str(&name(row));
            for col in 0..self.num_classes {
                content.push_str(&format!(",{}", self.get(row, col)));
            }
            content.push('\n');
        }

        std::fs::write(path, content)
    }
}

/// Running average for tracking loss during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value weighted by the number of samples it covers
    pub fn add_weighted(&mut self, value: f64, weight: usize) {
        self.sum += value * weight as f64;
        self.count += weight;
    }

    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Accumulates batch accuracy during an epoch
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    correct: usize,
    total: usize,
}

impl AccuracyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, predictions: &[usize], ground_truth: &[usize]) {
        self.correct += predictions
            .iter()
            .zip(ground_truth.iter())
            .filter(|(p, g)| p == g)
            .count();
        self.total += predictions.len().min(ground_truth.len());
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    pub fn count(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_confusion_matrix() {
        let predictions = vec![0, 1, 2, 0, 1, 1];
        let ground_truth = vec![0, 1, 2, 1, 1, 2];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 1);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(1, 1), 2);
        assert_eq!(cm.get(2, 1), 1);
        assert_eq!(cm.total(), 6);
        assert_eq!(cm.correct(), 4);
        assert_eq!(cm.row_sums(), vec![1, 3, 2]);
        assert_eq!(cm.col_sums(), vec![2, 3, 1]);
    }

    #[test]
    fn test_out_of_range_indices_ignored() {
        let cm = ConfusionMatrix::from_predictions(&[5, 0], &[0, 0], 2);
        assert_eq!(cm.total(), 1);
    }

    #[test]
    fn test_classification_report() {
        let predictions = vec![0, 0, 1, 1];
        let ground_truth = vec![0, 1, 1, 1];
        let report = ClassificationReport::from_predictions(
            &predictions,
            &ground_truth,
            &labels(&["bean:healthy", "bean:bean_rust"]),
        );

        assert!((report.accuracy - 0.75).abs() < 1e-9);
        let healthy = &report.per_class[0];
        assert!((healthy.precision - 0.5).abs() < 1e-9);
        assert!((healthy.recall - 1.0).abs() < 1e-9);
        assert_eq!(healthy.support, 1);
        let rust = &report.per_class[1];
        assert!((rust.precision - 1.0).abs() < 1e-9);
        assert!((rust.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!(report.display().contains("bean:bean_rust"));
    }

    #[test]
    fn test_save_csv_uses_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cm.csv");
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 0], 2);
        cm.save_csv(&path, &labels(&["healthy", "common_rust"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "actual\\predicted,healthy,common_rust");
        assert_eq!(lines[1], "healthy,1,1");
        assert_eq!(lines[2], "common_rust,0,0");
    }

    #[test]
    fn test_running_average() {
        let mut avg = RunningAverage::new();
        avg.add_weighted(1.0, 2);
        avg.add_weighted(4.0, 1);
        assert!((avg.average() - 2.0).abs() < 1e-9);
        assert_eq!(avg.count(), 3);
    }

    #[test]
    fn test_accuracy_tracker() {
        let mut tracker = AccuracyTracker::new();
        tracker.add_batch(&[0, 1, 2], &[0, 1, 1]);
        tracker.add_batch(&[0], &[0]);
        assert!((tracker.accuracy() - 0.75).abs() < 1e-9);
        assert_eq!(tracker.count(), 4);
    }
}
